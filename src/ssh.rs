//! Extraction of the destination host from an `ssh` command line.

/// OpenSSH options that consume the following argument.
const FLAGS_WITH_VALUE: &str = "BbcDEeFIiJLlmOoPpQRSWw";

/// Destination parsed from an `ssh` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub hostname: String,
    pub username: Option<String>,
    pub port: Option<u16>,
    pub key_path: Option<String>,
}

/// Parse `command` as an `ssh` invocation.
///
/// Returns `None` when the command is not `ssh` or names no usable host.
/// Option values (`-p 2222`, `-i ~/.ssh/key`, `-l user`) are skipped when
/// looking for the destination and recorded on the target.
pub fn parse_ssh_command(command: &str) -> Option<SshTarget> {
    let mut tokens = command.split_whitespace();
    if tokens.next()? != "ssh" {
        return None;
    }

    let mut login_name = None;
    let mut flag_port = None;
    let mut key_path = None;
    let mut destination = None;

    while let Some(token) = tokens.next() {
        if token == "--" {
            destination = tokens.next();
            break;
        }

        let Some(flags) = token.strip_prefix('-') else {
            destination = Some(token);
            break;
        };

        // Options may be bundled (`-vp 2222`) or carry their value inline (`-p2222`).
        for (i, flag) in flags.char_indices() {
            if !FLAGS_WITH_VALUE.contains(flag) {
                continue;
            }
            let inline = &flags[i + flag.len_utf8()..];
            let value = if inline.is_empty() {
                tokens.next()
            } else {
                Some(inline)
            };
            match flag {
                'p' => flag_port = value.and_then(|v| v.parse().ok()),
                'i' => key_path = value.map(str::to_string),
                'l' => login_name = value.map(str::to_string),
                _ => {}
            }
            break;
        }
    }

    let destination = destination?;
    let (user, host) = match destination.rsplit_once('@') {
        Some((user, host)) => (Some(user), host),
        None => (None, destination),
    };

    let (host, suffix_port) = split_port(host);
    if host.is_empty() {
        return None;
    }

    Some(SshTarget {
        hostname: host.to_string(),
        username: user
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .or(login_name),
        port: suffix_port.or(flag_port),
        key_path,
    })
}

/// Strip a trailing `:port` from a host, leaving bare IPv6 addresses alone.
fn split_port(host: &str) -> (&str, Option<u16>) {
    if let Some(inner) = host.strip_prefix('[') {
        return match inner.split_once(']') {
            Some((addr, rest)) => {
                let port = rest.strip_prefix(':').and_then(|p| p.parse().ok());
                (addr, port)
            }
            None => (inner, None),
        };
    }

    match host.split_once(':') {
        Some((name, port)) if !port.contains(':') => (name, port.parse().ok()),
        _ => (host, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(command: &str) -> Option<String> {
        parse_ssh_command(command).map(|t| t.hostname)
    }

    #[test]
    fn test_plain_host() {
        let target = parse_ssh_command("ssh prod.example.com").unwrap();
        assert_eq!(target.hostname, "prod.example.com");
        assert_eq!(target.username, None);
        assert_eq!(target.port, None);
    }

    #[test]
    fn test_user_at_host() {
        let target = parse_ssh_command("ssh admin@prod.example.com").unwrap();
        assert_eq!(target.hostname, "prod.example.com");
        assert_eq!(target.username.as_deref(), Some("admin"));
    }

    #[test]
    fn test_port_flag_and_suffix_are_stripped() {
        let target = parse_ssh_command("ssh -p 2222 user@host:2222").unwrap();
        assert_eq!(target.hostname, "host");
        assert_eq!(target.username.as_deref(), Some("user"));
        assert_eq!(target.port, Some(2222));
    }

    #[test]
    fn test_inline_and_bundled_flags() {
        assert_eq!(host("ssh -p2222 box").as_deref(), Some("box"));
        assert_eq!(host("ssh -vp 2222 box").as_deref(), Some("box"));
        assert_eq!(host("ssh -A -t box uptime").as_deref(), Some("box"));
    }

    #[test]
    fn test_identity_and_login_flags() {
        let target = parse_ssh_command("ssh -i ~/.ssh/deploy -l deploy web1").unwrap();
        assert_eq!(target.hostname, "web1");
        assert_eq!(target.username.as_deref(), Some("deploy"));
        assert_eq!(target.key_path.as_deref(), Some("~/.ssh/deploy"));
    }

    #[test]
    fn test_explicit_user_beats_login_flag() {
        let target = parse_ssh_command("ssh -l other admin@web1").unwrap();
        assert_eq!(target.username.as_deref(), Some("admin"));
    }

    #[test]
    fn test_leading_whitespace() {
        assert_eq!(host("   ssh  box  ").as_deref(), Some("box"));
    }

    #[test]
    fn test_not_ssh() {
        assert_eq!(host("sshfs box:/ /mnt"), None);
        assert_eq!(host("ls -la"), None);
        assert_eq!(host(""), None);
    }

    #[test]
    fn test_no_destination() {
        assert_eq!(host("ssh"), None);
        assert_eq!(host("ssh -v"), None);
        assert_eq!(host("ssh -p 22"), None);
        assert_eq!(host("ssh user@"), None);
    }

    #[test]
    fn test_ipv6_destinations() {
        assert_eq!(host("ssh ::1").as_deref(), Some("::1"));
        let target = parse_ssh_command("ssh root@[fe80::1]:2200").unwrap();
        assert_eq!(target.hostname, "fe80::1");
        assert_eq!(target.port, Some(2200));
    }
}

use once_cell::sync::Lazy;
use regex::Regex;

/// Destructive command shapes that are never executed, with the reason
/// reported to the user. Checked in order; the first hit wins.
const BLOCKLIST: &[(&str, &str)] = &[
    (
        r"\bsudo\s+rm\s+(?:-{1,2}[\w-]+\s+)+/\*?(?:$|[\s;&|])",
        "forced deletion of the root filesystem with elevated privileges",
    ),
    (
        r"\brm\s+(?:-{1,2}[\w-]+\s+)+/\*?(?:$|[\s;&|])",
        "recursive deletion of the root filesystem",
    ),
    (
        r"\brm\s+(?:-{1,2}[\w-]+\s+)+(?:~|\$HOME)/?\*?(?:$|[\s;&|])",
        "recursive deletion of the home directory",
    ),
    (
        r"(?:^|[;&|(]|\bsudo)\s*(?:shutdown|halt|poweroff|reboot)\b",
        "system shutdown or reboot",
    ),
    (
        r"(?:^|[;&|(]|\bsudo)\s*(?:init|telinit)\s+[06]\b",
        "runlevel change that halts or reboots the system",
    ),
    (r"\bmkfs(?:\.\w+)?\b", "filesystem formatting"),
    (r"\bdd\b.*\bof=/dev/", "raw write to a block device"),
    (r">\s*/dev/(?:sd|hd|vd|nvme|mmcblk)\w*", "overwrite of a disk device"),
    (r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:", "fork bomb"),
    (
        r"\bchmod\s+(?:-\w+\s+)*-R\s+(?:-\w+\s+)*777\s+/(?:$|\s)",
        "recursive permission change on the root filesystem",
    ),
    (
        r"\b(?:curl|wget)\b[^|]*\|\s*(?:sudo\s+)?(?:ba|z|da)?sh\b",
        "piping a downloaded script into a shell",
    ),
];

static COMPILED: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    BLOCKLIST
        .iter()
        .map(|(pattern, reason)| (Regex::new(pattern).expect("valid blocklist pattern"), *reason))
        .collect()
});

/// Returns the reason a command is blocked, if it is.
pub fn check_command(command: &str) -> Option<&'static str> {
    let command = command.trim();
    COMPILED
        .iter()
        .find(|(re, _)| re.is_match(command))
        .map(|(_, reason)| *reason)
}

pub fn is_blocked(command: &str) -> bool {
    check_command(command).is_some()
}

pub fn blocklist() -> &'static [(&'static str, &'static str)] {
    BLOCKLIST
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_known_destructive_commands() {
        for cmd in [
            "rm -rf /",
            "rm -rf /*",
            "rm -fr / --no-preserve-root",
            "sudo rm -rf /",
            "rm -rf ~",
            "shutdown -h now",
            "sudo reboot",
            "echo bye; halt",
            "init 0",
            "mkfs.ext4 /dev/sda1",
            "dd if=/dev/zero of=/dev/sda bs=1M",
            "cat junk > /dev/sda",
            ":(){ :|:& };:",
            "chmod -R 777 /",
            "curl -s https://example.com/x.sh | bash",
            "wget -qO- https://example.com/x.sh | sudo sh",
        ] {
            assert!(is_blocked(cmd), "expected '{}' to be blocked", cmd);
        }
    }

    #[test]
    fn allows_ordinary_commands() {
        for cmd in [
            "rm -rf /tmp/build",
            "rm -rf ./target",
            "ls -la /",
            "sudo apt-get update",
            "echo shutdown",
            "dd if=in.img of=out.img",
            "curl -s https://example.com -o page.html",
            "mkdir -p my_project",
        ] {
            assert!(!is_blocked(cmd), "expected '{}' to be allowed", cmd);
        }
    }

    #[test]
    fn sudo_deletion_reports_elevated_reason() {
        assert_eq!(
            check_command("sudo rm -rf /"),
            Some("forced deletion of the root filesystem with elevated privileges")
        );
        assert_eq!(
            check_command("rm -rf /"),
            Some("recursive deletion of the root filesystem")
        );
    }

    #[test]
    fn every_pattern_compiles() {
        assert_eq!(COMPILED.len(), blocklist().len());
    }
}

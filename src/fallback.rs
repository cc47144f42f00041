use crate::types::{Command, Interpretation, InterpretationOutcome, SUGGESTION_KIND};

const HELP_TOKENS: &[&str] = &["help", "?", "usage"];
const HELP_PHRASES: &[&[&str]] = &[&["how", "do", "i"]];

const DIRECT_SHELL_WARNING: &str =
    "Input executed as a raw shell command; interpretation safety review was bypassed";

/// Command names treated as a literal shell invocation when they lead the input.
const KNOWN_COMMANDS: &[&str] = &[
    "ls", "cd", "pwd", "cat", "echo", "grep", "find", "mkdir", "rmdir", "rm", "cp", "mv",
    "touch", "chmod", "chown", "ln", "head", "tail", "less", "wc", "sort", "uniq", "cut", "tr",
    "sed", "awk", "tar", "gzip", "gunzip", "zip", "unzip", "curl", "wget", "ssh", "scp",
    "rsync", "ps", "top", "htop", "kill", "killall", "df", "du", "free", "uname", "whoami",
    "hostname", "date", "uptime", "which", "file", "stat", "diff", "tree", "git", "docker",
    "kubectl", "make", "cargo", "npm", "pip", "pip3", "python", "python3", "node", "apt",
    "apt-get", "brew", "sudo", "systemctl", "journalctl", "ping", "ip", "ifconfig", "env",
    "export", "history", "man", "xargs", "tee", "jq", "rg", "fd",
];

/// Last-resort local interpretation. Pure: the same text always yields the
/// same interpretation.
#[derive(Debug, Default, Clone)]
pub struct FallbackInterpreter;

impl FallbackInterpreter {
    pub fn new() -> Self {
        Self
    }

    pub fn fallback_interpret(&self, text: &str) -> Interpretation {
        let trimmed = text.trim();
        let lower = trimmed.to_lowercase();

        if is_help_request(&lower) {
            return Interpretation {
                intent: "Show help information".to_string(),
                commands: vec![Command::new(
                    "help",
                    "Try requests like 'install git', 'create a folder called notes', \
                     'show me the files', or type a shell command directly",
                    SUGGESTION_KIND,
                )],
                confidence: 0.3,
                outcome: InterpretationOutcome::Fallback { warnings: vec![] },
            };
        }

        if looks_like_shell(trimmed) {
            return Interpretation {
                intent: "Execute shell command directly".to_string(),
                commands: vec![Command::new(trimmed, "Run the input as typed", "direct_shell")],
                confidence: 0.5,
                outcome: InterpretationOutcome::Fallback {
                    warnings: vec![DIRECT_SHELL_WARNING.to_string()],
                },
            };
        }

        Interpretation {
            intent: "Command not recognized".to_string(),
            commands: vec![Command::new(
                "",
                "Could not map this request to a command; try rephrasing it more specifically",
                SUGGESTION_KIND,
            )],
            confidence: 0.0,
            outcome: InterpretationOutcome::Fallback { warnings: vec![] },
        }
    }
}

fn is_help_request(lower: &str) -> bool {
    let words: Vec<&str> = lower
        .split_whitespace()
        .filter_map(|raw| {
            let word = raw.trim_matches(|c: char| c.is_ascii_punctuation());
            match word {
                "" if raw.contains('?') => Some("?"),
                "" => None,
                word => Some(word),
            }
        })
        .collect();
    words.iter().any(|w| HELP_TOKENS.contains(w))
        || HELP_PHRASES
            .iter()
            .any(|phrase| words.windows(phrase.len()).any(|window| window == *phrase))
}

fn looks_like_shell(text: &str) -> bool {
    let Some(first) = text.split_whitespace().next() else {
        return false;
    };
    if first.starts_with("./") || first.starts_with('/') {
        return true;
    }
    KNOWN_COMMANDS.contains(&first)
}

/// Programs the shell validator classifies as `Safe`.
#[must_use]
pub fn default_allowed_commands() -> Vec<String> {
    vec![
        "git".into(),
        "npm".into(),
        "cargo".into(),
        "ls".into(),
        "cat".into(),
        "grep".into(),
        "find".into(),
        "echo".into(),
        "pwd".into(),
        "wc".into(),
        "head".into(),
        "tail".into(),
        "date".into(),
        "whoami".into(),
        "which".into(),
        "tree".into(),
        "diff".into(),
        "sort".into(),
        "uniq".into(),
        "stat".into(),
    ]
}

/// Programs the shell validator classifies as `Blocked` under every policy.
#[must_use]
pub fn default_blocked_commands() -> Vec<String> {
    vec![
        // Destructive filesystem operations
        "rm".into(),
        "rmdir".into(),
        "shred".into(),
        "mkfs".into(),
        "dd".into(),
        "chmod".into(),
        "chown".into(),
        // Privilege escalation
        "sudo".into(),
        "su".into(),
        "doas".into(),
        // System control
        "shutdown".into(),
        "reboot".into(),
        "halt".into(),
        "poweroff".into(),
        "kill".into(),
        "killall".into(),
        "pkill".into(),
        // Network egress
        "curl".into(),
        "wget".into(),
        "nc".into(),
        "ncat".into(),
        "ssh".into(),
        "scp".into(),
        "rsync".into(),
        // Interpreters that hide arbitrary execution
        "sh".into(),
        "bash".into(),
        "zsh".into(),
        "python".into(),
        "python3".into(),
        "node".into(),
        "perl".into(),
        "ruby".into(),
        "eval".into(),
        "exec".into(),
        "xargs".into(),
    ]
}

/// Tools whose calls are judged intrinsically safe (no side effects).
#[must_use]
pub fn default_read_only_tools() -> Vec<String> {
    vec![
        "read_file".into(),
        "list_directory".into(),
        "git_status".into(),
        "git_log".into(),
        "git_diff".into(),
        "web_search".into(),
        "knowledge_search".into(),
    ]
}

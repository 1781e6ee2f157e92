use tollgate::SecurityError;
use serde_json::{Map, json};
use tollgate::security::{ApprovalManager, CommandClass, Disposition, ShellCommandValidator};

fn classify(command: &str) -> CommandClass {
    ShellCommandValidator::default()
        .validate(command)
        .unwrap()
        .classification
}

#[test]
fn allow_listed_programs_are_safe() {
    for command in ["git status", "ls -la", "cat README.md", "/usr/bin/grep todo src"] {
        assert_eq!(classify(command), CommandClass::Safe, "{command}");
    }
}

#[test]
fn block_listed_programs_are_blocked() {
    for command in ["rm -rf /", "sudo apt install x", "curl https://example.com", "python3 x.py"] {
        assert_eq!(classify(command), CommandClass::Blocked, "{command}");
    }
}

#[test]
fn dangerous_subcommands_of_allowed_programs_are_blocked() {
    for command in ["git push origin main", "npm publish", "find . -delete"] {
        assert_eq!(classify(command), CommandClass::Blocked, "{command}");
    }
}

#[test]
fn git_code_execution_options_are_blocked() {
    for command in [
        "git -c alias.p=!id p",
        "git -c core.hooksPath=/tmp/hooks commit -m x",
        "git -c gpg.program=sh log --show-signature",
        "git --config-env=alias.x=CMD x",
        "git --git-dir=/root/.git log",
    ] {
        assert_eq!(classify(command), CommandClass::Blocked, "{command}");
    }
}

#[test]
fn shell_commands_reaching_outside_the_workspace_are_confirmed() {
    let approvals = ApprovalManager::default();
    for command in ["cat $HOME/.ssh/id_rsa", "grep --file=/etc/passwd x", "git -c alias.p=!id p"] {
        let mut args = Map::new();
        args.insert("command".into(), json!(command));
        let disposition = approvals.disposition("shell_execute", &args, None);
        assert!(
            !matches!(disposition, Disposition::Execute),
            "{command}: {disposition:?}"
        );
    }
}

#[test]
fn unlisted_programs_need_approval() {
    let verdict = ShellCommandValidator::default().validate("uname -a").unwrap();
    assert_eq!(verdict.classification, CommandClass::Unknown);
    assert!(verdict.requires_approval);
}

#[test]
fn operators_are_rejected_before_the_lists_are_consulted() {
    let validator = ShellCommandValidator::default();
    for (command, operator) in [
        ("ls && rm -rf /", "&&"),
        ("cat a | sh", "|"),
        ("echo hi > out", ">"),
        ("echo $(whoami)", "$("),
        ("ls; reboot", ";"),
    ] {
        match validator.validate(command) {
            Err(SecurityError::DangerousPattern { pattern }) => {
                assert_eq!(pattern, operator, "{command}");
            }
            other => panic!("{command}: expected DangerousPattern, got {other:?}"),
        }
    }
}

#[test]
fn empty_command_is_an_error() {
    assert!(matches!(
        ShellCommandValidator::default().validate("   "),
        Err(SecurityError::EmptyCommand)
    ));
}

#[test]
fn custom_lists_replace_the_defaults() {
    let validator = ShellCommandValidator::new(vec!["make".into()], vec!["git".into()]);
    assert!(validator.validate("make test").unwrap().is_safe());
    assert!(validator.validate("git status").unwrap().is_blocked());
    assert_eq!(
        validator.validate("ls").unwrap().classification,
        CommandClass::Unknown
    );
}

//! Tests of the `nash` binary.

use std::process::{Command, Output};

fn nash(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_nash"))
        .arg("--noinit")
        .args(args)
        .output()
        .expect("failed to run nash")
}

#[test]
fn runs_command_string() {
    let out = nash(&["-c", r#"echo -n "hello world""#]);
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "hello world");
}

#[test]
fn exit_builtin_sets_status() {
    let out = nash(&["-c", r#"exit("3")"#]);
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn script_error_exits_one() {
    let out = nash(&["-c", "print($nope)"]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Variable $nope not set"), "{stderr}");
}

#[test]
fn syntax_error_exits_one() {
    let out = nash(&["-c", "if {"]);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn script_file_gets_args() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("args.sh");
    std::fs::write(&script, "for a in $ARGS {\n\techo $a\n}\n").unwrap();
    let path = script.to_string_lossy().into_owned();

    let out = nash(&[&path, "one", "two"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(String::from_utf8_lossy(&out.stdout), format!("{path}\none\ntwo\n"));
}

#[test]
fn init_is_loaded_unless_noinit() {
    let nashpath = tempfile::tempdir().unwrap();
    let nashroot = tempfile::tempdir().unwrap();
    std::fs::write(nashpath.path().join("init"), "var GREETING = \"from init\"\n").unwrap();

    let run = |noinit: bool| {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_nash"));
        cmd.env("NASHPATH", nashpath.path()).env("NASHROOT", nashroot.path());
        if noinit {
            cmd.arg("--noinit");
        }
        cmd.args(["-c", "print($GREETING)"]).output().expect("failed to run nash")
    };

    let out = run(false);
    assert_eq!(String::from_utf8_lossy(&out.stdout), "from init");
    let out = run(true);
    assert_eq!(out.status.code(), Some(1));
}

/// `nash -c` with the directory holding the `write` tool first on PATH.
fn nash_with_tools(script: &str) -> Output {
    let tools = std::path::Path::new(env!("CARGO_BIN_EXE_write"))
        .parent()
        .expect("binary directory")
        .to_path_buf();
    let path = std::env::join_paths(
        std::iter::once(tools).chain(std::env::split_paths(&std::env::var_os("PATH").unwrap_or_default())),
    )
    .unwrap();
    Command::new(env!("CARGO_BIN_EXE_nash"))
        .env("PATH", path)
        .args(["--noinit", "-c", script])
        .output()
        .expect("failed to run nash")
}

#[test]
fn captures_stderr_of_write_tool() {
    let out = nash_with_tools(
        r#"var out, err, st <= write /dev/stderr "hello"; echo $out; echo $err; echo -n $st"#,
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "\nhello\n0");
}

#[test]
fn write_tool_appends_data_and_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("log.txt");
    let script = format!(
        "write \"{0}\" \"one\\n\"\necho two | write \"{0}\"",
        file.display()
    );
    let out = nash_with_tools(&script);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "one\ntwo\n");

    let usage = Command::new(env!("CARGO_BIN_EXE_write")).output().unwrap();
    assert_eq!(usage.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&usage.stderr).contains("<file> <data>"));
}

fn user_namespaces_available() -> bool {
    Command::new("unshare")
        .args(["-U", "true"])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[test]
#[cfg(target_os = "linux")]
fn rfork_runs_block_as_namespace_root() {
    if !user_namespaces_available() {
        eprintln!("skipping: user namespaces unavailable");
        return;
    }
    let out = nash(&["-c", "rfork u { id -u }"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "0\n");
}

#[test]
#[cfg(target_os = "linux")]
fn rfork_reports_failing_statement() {
    if !user_namespaces_available() {
        eprintln!("skipping: user namespaces unavailable");
        return;
    }
    let out = nash(&["-c", "rfork u {\n\techo first\n\tsh -c \"exit 2\"\n\techo never\n}"]);
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "first\n");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Exited with status 1"), "{stderr}");
}

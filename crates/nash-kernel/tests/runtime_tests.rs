//! Runtime tests: processes, redirects, interrupts, imports and the nashd
//! line protocol.

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use nash_kernel::{OutputBuffer, Shell, ShellConfig, Sink, Value, rfork};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn shell_with(config: ShellConfig) -> (Shell, OutputBuffer, OutputBuffer) {
    let shell = Shell::new(config);
    let out = OutputBuffer::new();
    let err = OutputBuffer::new();
    shell.set_stdout(Sink::Buffer(out.clone()));
    shell.set_stderr(Sink::Buffer(err.clone()));
    (shell, out, err)
}

fn shell() -> (Shell, OutputBuffer, OutputBuffer) {
    shell_with(ShellConfig::default().with_env(std::env::vars().collect()))
}

fn quoted(path: &Path) -> String {
    nash_kernel::ast::format::quote(&path.display().to_string())
}

// =============================================================================
// PIPELINES
// =============================================================================

#[tokio::test]
async fn test_pipeline_moves_large_output() {
    let (shell, out, _) = shell();
    shell
        .exec("t", r#"seq 1 20000 | wc -l | tr -d " ""#)
        .await
        .unwrap();
    assert_eq!(out.contents(), "20000\n");
}

#[tokio::test]
async fn test_pipeline_feeds_stdin_source() {
    let (shell, out, _) = shell();
    shell.set_stdin(nash_kernel::Source::bytes("b\na\nc\n"));
    shell.exec("t", "sort | head -n 2").await.unwrap();
    assert_eq!(out.contents(), "a\nb\n");
}

#[tokio::test]
async fn test_large_output_between_bound_functions() {
    let (shell, out, _) = shell();
    let script = r#"fn produce() { seq 1 100000 }
fn count() { wc -l }
bindfn produce numbers
bindfn count lines
numbers | lines | tr -d " "
"#;
    tokio::time::timeout(Duration::from_secs(30), shell.exec("t", script))
        .await
        .expect("pipeline of bound functions hung")
        .unwrap();
    assert_eq!(out.contents(), "100000\n");
}

#[tokio::test]
async fn test_bound_function_between_externals() {
    let (shell, out, _) = shell();
    let script = r#"fn upper() { tr a-z A-Z }
fn twice() { sed p }
bindfn upper up
bindfn twice dup
printf "a\nb\n" | up | dup | sort
"#;
    shell.exec("t", script).await.unwrap();
    assert_eq!(out.contents(), "A\nA\nB\nB\n");
}

#[tokio::test]
async fn test_status_after_each_stage_kind() {
    let (shell, _, _) = shell();
    shell.exec("t", r#"-sh -c "exit 9""#).await.unwrap();
    assert_eq!(shell.get_var("status"), Some(Value::str("9")));
    shell.exec("t", "true | true").await.unwrap();
    assert_eq!(shell.get_var("status"), Some(Value::str("0")));
}

#[tokio::test]
async fn test_signal_exit_status() {
    let (shell, _, _) = shell();
    let err = shell.exec("t", r#"sh -c "kill -9 $$""#).await.unwrap_err();
    assert_eq!(err.command_status(), 137);
}

// =============================================================================
// REDIRECTS
// =============================================================================

#[tokio::test]
async fn test_redirect_truncates_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("out.txt");
    let (shell, _, _) = shell();
    let script = format!(
        "var f = {}\necho -n first payload > $f\necho -n second > $f",
        quoted(&file)
    );
    shell.exec("t", &script).await.unwrap();
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "second");
}

#[tokio::test]
async fn test_redirect_stderr_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("err.txt");
    let (shell, out, err) = shell();
    let script = format!(r#"sh -c "echo out; echo err >&2" >[2] {}"#, quoted(&file));
    shell.exec("t", &script).await.unwrap();
    assert_eq!(out.contents(), "out\n");
    assert_eq!(err.contents(), "");
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "err\n");
}

#[tokio::test]
async fn test_redirect_bound_function() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("fn.txt");
    let (shell, out, _) = shell();
    let script = format!(
        "fn hello() {{ print(\"from fn\") }}\nbindfn hello hi\nhi > {}",
        quoted(&file)
    );
    shell.exec("t", &script).await.unwrap();
    assert_eq!(out.contents(), "");
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "from fn");
}

#[tokio::test]
async fn test_redirect_to_tcp() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let reader = std::thread::spawn(move || {
        let (mut conn, _) = listener.accept().unwrap();
        let mut got = String::new();
        conn.read_to_string(&mut got).unwrap();
        got
    });

    let (shell, _, _) = shell();
    let script = format!(r#"echo over tcp > "tcp://{addr}""#);
    shell.exec("t", &script).await.unwrap();
    assert_eq!(reader.join().unwrap(), "over tcp\n");
}

#[tokio::test]
async fn test_redirect_to_unix_socket() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sink.sock");
    let listener = std::os::unix::net::UnixListener::bind(&path).unwrap();
    let reader = std::thread::spawn(move || {
        let (mut conn, _) = listener.accept().unwrap();
        let mut got = String::new();
        conn.read_to_string(&mut got).unwrap();
        got
    });

    let (shell, _, _) = shell();
    let script = format!(r#"echo over unix > "unix://{}""#, path.display());
    shell.exec("t", &script).await.unwrap();
    assert_eq!(reader.join().unwrap(), "over unix\n");
}

#[tokio::test]
async fn test_redirect_to_udp() {
    let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    let addr = socket.local_addr().unwrap();

    let (shell, _, _) = shell();
    let script = format!(r#"echo -n datagram > "udp://{addr}""#);
    shell.exec("t", &script).await.unwrap();

    let mut buf = [0u8; 64];
    let n = socket.recv(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"datagram");
}

#[tokio::test]
async fn test_redirect_errors_are_located() {
    let (shell, _, _) = shell();
    let err = shell.exec("r.sh", "echo\necho >[0=1]").await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.starts_with("r.sh:2:"), "{msg}");
    assert!(msg.ends_with("Does not support stdin redirection yet"), "{msg}");
}

// =============================================================================
// INTERRUPTS
// =============================================================================

#[tokio::test]
async fn test_interrupt_stops_infinite_loop() {
    let (shell, _, _) = shell();
    let (result, ()) = tokio::join!(shell.exec("t", "for {\n}"), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        shell.trigger_ctrlc();
    });
    let err = result.unwrap_err();
    assert!(err.is_interrupted(), "{err}");
}

#[tokio::test]
async fn test_interrupt_stops_nested_loops() {
    let (shell, out, _) = shell();
    let script = "for {\n\tfor x in (a b) {\n\t}\n}\necho after";
    let (result, ()) = tokio::join!(shell.exec("t", script), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        shell.trigger_ctrlc();
    });
    let err = result.unwrap_err();
    assert!(err.is_interrupted(), "{err}");
    assert_eq!(out.contents(), "");

    // The shell is usable again afterwards.
    shell.exec("t", "for x in (a) { echo $x }").await.unwrap();
    assert_eq!(out.contents(), "a\n");
}

#[tokio::test]
async fn test_interrupt_outside_loop_is_dropped() {
    let (shell, out, _) = shell();
    shell.trigger_ctrlc();
    shell.exec("t", "for x in (a b) { echo $x }").await.unwrap();
    assert_eq!(out.contents(), "a\nb\n");
}

// =============================================================================
// IMPORTS AND SCRIPTS
// =============================================================================

#[tokio::test]
async fn test_exec_file_binds_args_and_imports_siblings() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("lib.sh"), "fn greet(who) { echo hello $who }\n").unwrap();
    let main = dir.path().join("main.sh");
    std::fs::write(&main, "import lib\ngreet($ARGS[1])\n").unwrap();

    let (shell, out, _) = shell();
    shell.exec_file(&main, &["world".to_string()]).await.unwrap();
    assert_eq!(out.contents(), "hello world\n");
    assert_eq!(shell.filename(), shell.name());
}

#[tokio::test]
async fn test_import_from_nashpath_lib() {
    let nashpath = tempfile::tempdir().unwrap();
    std::fs::create_dir(nashpath.path().join("lib")).unwrap();
    std::fs::write(nashpath.path().join("lib/util.sh"), "var UTIL = \"loaded\"\n").unwrap();

    let (shell, out, _) = shell_with(
        ShellConfig::default()
            .with_env(std::env::vars().collect())
            .with_nashpath(nashpath.path()),
    );
    shell.exec("t", "import util\necho $UTIL").await.unwrap();
    assert_eq!(out.contents(), "loaded\n");
}

#[tokio::test]
async fn test_import_failure_lists_locations() {
    let (shell, _, _) = shell();
    let err = shell.exec("t", "import definitely_missing_module").await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("Failed to import path 'definitely_missing_module'"), "{msg}");
    assert!(msg.contains("definitely_missing_module.sh"), "{msg}");
}

#[tokio::test]
async fn test_rfork_rejects_bad_flags() {
    let (shell, _, _) = shell();
    let err = shell.exec("t", "rfork x { echo }").await.unwrap_err();
    assert!(err.to_string().ends_with("Wrong rfork flag: x"), "{err}");
}

// =============================================================================
// NASHD LINE PROTOCOL
// =============================================================================

async fn reply(stream: &mut tokio::net::UnixStream, request: &str) -> String {
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut buf = [0u8; 32];
    let n = stream.read(&mut buf).await.unwrap();
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

#[tokio::test]
async fn test_nashd_serves_statements() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("nashd.sock");
    let (shell, out, err) = shell();

    let client = async {
        let mut stream = tokio::net::UnixStream::connect(&socket).await.unwrap();
        let mut replies = vec![reply(&mut stream, "echo hi\n").await];
        stream.write_all(b"if \"a\" == \"a\" {\n").await.unwrap();
        replies.push(reply(&mut stream, "echo yes\n}\n").await);
        replies.push(reply(&mut stream, "no-such-command-nashd\n").await);
        replies.push(reply(&mut stream, "exit(\"3\")\n").await);
        replies
    };
    let (served, replies) = tokio::join!(rfork::serve(&shell, &socket), client);

    served.unwrap();
    assert_eq!(replies, vec!["0", "0", "1", "3"]);
    assert_eq!(out.contents(), "hi\nyes\n");
    assert!(err.contents().starts_with("nashd: "), "{}", err.contents());
    assert_eq!(err.contents().lines().count(), 1, "{}", err.contents());
    assert!(!socket.exists());
}

#[tokio::test]
async fn test_nashd_quit() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("quit.sock");
    let (shell, _, _) = shell();

    let client = async {
        let mut stream = tokio::net::UnixStream::connect(&socket).await.unwrap();
        let status = reply(&mut stream, "var a = \"1\"\n").await;
        stream.write_all(b"quit").await.unwrap();
        status
    };
    let (served, status) = tokio::join!(rfork::serve(&shell, &socket), client);
    served.unwrap();
    assert_eq!(status, "0");
    assert_eq!(shell.get_var("a"), Some(Value::str("1")));
}

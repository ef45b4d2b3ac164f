//! Evaluation tests for the nash interpreter.
//!
//! Each case runs a script in a fresh shell whose stdout and stderr are
//! captured in memory.

use nash_kernel::{OutputBuffer, Result, Shell, ShellConfig, Sink, Value};
use rstest::rstest;

struct Run {
    shell: Shell,
    result: Result<()>,
    stdout: String,
    stderr: String,
}

async fn run(script: &str) -> Run {
    let shell = Shell::new(ShellConfig::default().with_env(std::env::vars().collect()));
    let out = OutputBuffer::new();
    let err = OutputBuffer::new();
    shell.set_stdout(Sink::Buffer(out.clone()));
    shell.set_stderr(Sink::Buffer(err.clone()));
    let result = shell.exec("test.sh", script).await;
    Run {
        shell,
        result,
        stdout: out.contents(),
        stderr: err.contents(),
    }
}

async fn run_ok(script: &str) -> String {
    let run = run(script).await;
    if let Err(e) = &run.result {
        panic!("script failed: {e}\nstderr: {}", run.stderr);
    }
    run.stdout
}

// =============================================================================
// END-TO-END SCENARIOS
// =============================================================================

#[rstest]
#[case::echo_flag(r#"echo -n "hello world""#, "hello world")]
#[case::for_over_list("var a = (1 2 3); for x in $a { echo $x }", "1\n2\n3\n")]
#[case::closure_captures_argument(
    r#"fn make(x) { fn add(y) { var r <= expr $x "+" $y; return $r }; return $add }; var add5 <= make("5"); print("%s\n", add5("10"))"#,
    "15\n"
)]
#[case::three_stage_pipe(r#"echo hello | wc -l | tr -d "[:space:]""#, "1")]
#[case::capture_stderr(
    r#"var out, err, st <= sh -c "printf hello >&2"; echo $out; echo $err; echo -n $st"#,
    "\nhello\n0"
)]
#[case::spread_variadic(
    r#"fn p(args...) { for a in $args { echo $a } }; var a = ("1" "2" "3"); p($a...)"#,
    "1\n2\n3\n"
)]
#[case::if_else(r#"if "test" == "test" { echo ok } else { echo no }"#, "ok\n")]
#[case::indexed_assignment(r#"var l = (0 1 2 3); l[2] = "X"; echo -n $l"#, "0 1 X 3")]
#[tokio::test]
async fn eval_scenarios(#[case] script: &str, #[case] stdout: &str) {
    assert_eq!(run_ok(script).await, stdout);
}

#[tokio::test]
async fn eval_missing_command_status() {
    let run = run("var _, status <= not-a-real-command >[2=]").await;
    assert!(run.result.is_ok(), "{:?}", run.result);
    assert_eq!(run.shell.get_var("status"), Some(Value::str("127")));
}

// =============================================================================
// VARIABLES AND LISTS
// =============================================================================

#[rstest]
#[case::multi_assign(r#"a, b = "1", "2"; echo $a $b"#, "1 2\n")]
#[case::list_destructure(r#"var a, b = ("x" "y"); echo $b $a"#, "y x\n")]
#[case::underscore_discards(r#"var _, b = ("x" "y"); echo $b"#, "y\n")]
#[case::concat(r#"var a = "foo"; echo $a+"-"+"bar""#, "foo-bar\n")]
#[case::index_by_var(r#"var l = (a b c); var i = "2"; echo $l[$i]"#, "c\n")]
#[case::string_index_runes(r#"var s = "héllo"; echo $s[1]"#, "é\n")]
#[case::for_over_string(r#"for c in "abc" { echo $c }"#, "a\nb\nc\n")]
#[case::nested_list_arg(r#"var l = (a (b c)); echo $l"#, "a b c\n")]
#[case::append_builtin(r#"var l = (a); l <= append($l, "x"); echo $l"#, "a x\n")]
#[case::len_builtin(r#"var l = (a b c); print("%s\n", len($l))"#, "3\n")]
#[case::format_builtin(r#"var s <= format("%s=%s", "k", "v"); echo $s"#, "k=v\n")]
#[case::split_builtin(r#"var p <= split("a:b:c", ":"); echo $p[2]"#, "c\n")]
#[tokio::test]
async fn eval_variables(#[case] script: &str, #[case] stdout: &str) {
    assert_eq!(run_ok(script).await, stdout);
}

// =============================================================================
// FUNCTIONS
// =============================================================================

#[rstest]
#[case::multi_return(r#"fn two() { return "a", "b" }; var x, y <= two(); echo $x $y"#, "a b\n")]
#[case::single_target_collects(r#"fn two() { return "a", "b" }; var l <= two(); echo $l[1]"#, "b\n")]
#[case::call_through_var("fn hi() { echo hi }; var f = $hi; $f()", "hi\n")]
#[case::fn_as_value_arg(
    r#"fn apply(f, v) { $f($v) }; fn shout(s) { echo $s+"!" }; apply($shout, "hey")"#,
    "hey!\n"
)]
#[case::variadic_empty(r#"fn v(rest...) { print("%s\n", len($rest)) }; v()"#, "0\n")]
#[case::fixed_and_variadic(
    r#"fn v(a, rest...) { echo $a; echo $rest }; v("1", "2", "3")"#,
    "1\n2 3\n"
)]
#[case::return_stops_loop(
    r#"fn first(l) { for x in $l { return $x } }; var l = (a b); var f <= first($l); echo $f"#,
    "a\n"
)]
#[case::locals_do_not_leak(
    r#"var x = "outer"; fn f() { var x = "inner" }; f(); echo $x"#,
    "outer\n"
)]
#[case::assignment_updates_outer(r#"var x = "a"; fn f() { x = "b" }; f(); echo $x"#, "b\n")]
#[tokio::test]
async fn eval_functions(#[case] script: &str, #[case] stdout: &str) {
    assert_eq!(run_ok(script).await, stdout);
}

#[tokio::test]
async fn eval_closures_keep_private_state() {
    let script = r#"
fn counter() {
	var n = ""

	fn inc() {
		n = $n+"x"
		return $n
	}

	return $inc
}

var c1 <= counter()
var c2 <= counter()
var a <= c1()
var b <= c1()
var d <= c2()
echo $a $b $d
"#;
    assert_eq!(run_ok(script).await, "x xx x\n");
}

// =============================================================================
// BINDFN
// =============================================================================

#[rstest]
#[case::bound_command(r#"fn greet(name) { echo hi $name }; bindfn greet hello; hello world"#, "hi world\n")]
#[case::missing_args_are_empty(r#"fn greet(name) { echo hi $name }; bindfn greet hello; hello"#, "hi \n")]
#[case::bind_in_pipe(
    r#"fn up() { tr a-z A-Z }; bindfn up upper; echo abc | upper | tr -d "\n""#,
    "ABC"
)]
#[case::bind_captured(r#"fn say() { echo said }; bindfn say sayit; var o <= sayit; echo $o"#, "said\n")]
#[tokio::test]
async fn eval_bindfn(#[case] script: &str, #[case] stdout: &str) {
    assert_eq!(run_ok(script).await, stdout);
}

// =============================================================================
// CONDITIONALS
// =============================================================================

#[rstest]
#[case::not_equal(r#"if "a" != "b" { echo diff }"#, "diff\n")]
#[case::false_no_else(r#"if "a" == "b" { echo same }"#, "")]
#[case::else_if(
    r#"var a = "x"; if $a == "y" { echo y } else if $a == "x" { echo x } else { echo z }"#,
    "x\n"
)]
#[case::status_check(r#"-false; if $status != "0" { echo failed }"#, "failed\n")]
#[tokio::test]
async fn eval_conditionals(#[case] script: &str, #[case] stdout: &str) {
    assert_eq!(run_ok(script).await, stdout);
}

// =============================================================================
// EXEC ASSIGNMENT AND STATUS
// =============================================================================

#[rstest]
#[case::trailing_newline_trimmed(r#"var o <= echo hi; echo -n "["+$o+"]""#, "[hi]")]
#[case::only_one_newline_trimmed(r#"var o <= printf "a\n\n"; echo -n "["+$o+"]""#, "[a\n]")]
#[case::ifs_split(r#"IFS = (":"); var parts <= echo -n "a:b:c"; echo $parts[1]"#, "b\n")]
#[case::ifs_multiple(r#"IFS = (" " ","); var parts <= echo -n "a,b c"; print("%s\n", len($parts))"#, "3\n")]
#[case::stderr_into_stdout(r#"var out <= sh -c "printf oops >&2" >[2=1]; echo $out"#, "oops\n")]
#[case::status_of_failure(r#"var out, st <= sh -c "exit 3"; echo $st"#, "3\n")]
#[case::pipe_status_is_last(r#"var out, st <= sh -c "exit 4" | cat; echo $st"#, "0\n")]
#[case::pipe_capture(r#"var out <= echo abc | tr a-z A-Z; echo $out"#, "ABC\n")]
#[case::ignore_prefix(r#"-sh -c "exit 5"; echo $status"#, "5\n")]
#[case::ignored_missing("-not-a-real-command-zz >[2=]; echo $status", "127\n")]
#[tokio::test]
async fn eval_exec_assign(#[case] script: &str, #[case] stdout: &str) {
    assert_eq!(run_ok(script).await, stdout);
}

#[tokio::test]
async fn eval_single_target_failure_propagates() {
    let run = run(r#"var out <= sh -c "echo partial; exit 2"; echo after"#).await;
    assert!(run.result.is_err());
    assert_eq!(run.stdout, "");
    assert_eq!(run.shell.get_var("out"), Some(Value::str("partial")));
}

#[tokio::test]
async fn eval_pipeline_error_lists_stages() {
    let run = run(r#"sh -c "exit 1" | cat"#).await;
    let err = run.result.unwrap_err();
    assert_eq!(err.to_string(), "exit status 1|success");
}

// =============================================================================
// ENVIRONMENT
// =============================================================================

#[rstest]
#[case::setenv_assign(r#"setenv FOO = "bar"; env | grep "^FOO=""#, "FOO=bar\n")]
#[case::setenv_existing(r#"var FOO = "baz"; setenv FOO; env | grep "^FOO=""#, "FOO=baz\n")]
#[case::setenv_list(r#"var L = (a b); setenv L; env | grep "^L=""#, "L=(a b)\n")]
#[case::unexported_hidden(
    r#"var HIDDEN_NASH_VAR = "x"; var n, _ <= env | grep -c "^HIDDEN_NASH_VAR="; echo $n"#,
    "0\n"
)]
#[tokio::test]
async fn eval_environment(#[case] script: &str, #[case] stdout: &str) {
    assert_eq!(run_ok(script).await, stdout);
}

// =============================================================================
// ERRORS
// =============================================================================

#[rstest]
#[case::unset_var("echo $nope", "Variable $nope not set")]
#[case::index_out_of_bounds("var l = (1 2); echo $l[5]", "Index out of bounds. len($l) == 2, but given 5")]
#[case::string_mutation(r#"var s = "abc"; s[0] = "x""#, "Indexed assignment requires a list")]
#[case::arity(
    "fn f(a) { echo $a }; f()",
    "Wrong number of arguments for function f. Expected 1 but found 0"
)]
#[case::too_many_args(
    r#"fn f(a) { echo $a }; f("1", "2")"#,
    "Wrong number of arguments for function f. Expected 1 but found 2"
)]
#[case::bound_too_many_args(
    "fn f(a) { echo $a }; bindfn f fcmd; fcmd one two",
    "Wrong number of arguments for function f. Expected 1 but found 2"
)]
#[case::exit_needs_number(r#"exit("soon")"#, "exit: converting status 'soon' to int")]
#[case::glob_needs_string(r#"var l = (a); glob($l)"#, "glob expects a pattern string")]
#[case::if_on_list(r#"var l = (a); if $l == "a" { echo x }"#, "if only compares strings")]
#[case::bindfn_unknown("bindfn nope cmd", "No such function 'nope'")]
#[case::return_at_top("return", "Unexpected return outside of function declaration.")]
#[case::not_found("not-a-real-command-xyz", "not-a-real-command-xyz: command not found")]
#[case::setenv_unset("setenv NOPE_NASH_X", "Variable 'NOPE_NASH_X' not set on shell")]
#[case::call_string(r#"var s = "x"; $s()"#, "Variable $s is a string, not a function")]
#[case::concat_list(r#"var l = (a b); echo $l+"x""#, "Impossible to concat a list")]
#[case::fn_returns_nothing(
    "fn f() { echo x }; var a <= f()",
    "Invalid assignment from function that does not return values"
)]
#[case::exit_status("sh -c \"exit 7\"", "exit status 7")]
#[tokio::test]
async fn eval_errors(#[case] script: &str, #[case] message: &str) {
    let run = run(script).await;
    let err = run.result.expect_err("script should fail");
    assert!(err.to_string().contains(message), "got: {err}");
}

#[tokio::test]
async fn eval_errors_are_located() {
    let run = run("echo ok\nfn f(a) { echo $a }\nf()").await;
    let err = run.result.unwrap_err();
    assert!(err.to_string().starts_with("test.sh:3:"), "got: {err}");
}

#[tokio::test]
async fn eval_exit_unwinds() {
    let run = run(r#"echo before; exit("4"); echo after"#).await;
    match run.result {
        Err(nash_kernel::Error::Exit(code)) => assert_eq!(code, 4),
        other => panic!("expected exit, got {other:?}"),
    }
    assert_eq!(run.stdout, "before\n");
}

// =============================================================================
// DUMP
// =============================================================================

#[tokio::test]
async fn eval_dump_to_stdout() {
    let out = run_ok(
        r#"var greeting = "hi"; setenv GREETING_NASH = "x"; fn f(a) { echo $a }; bindfn f ff; dump"#,
    )
    .await;
    assert!(out.contains("var greeting = \"hi\"\n"), "{out}");
    assert!(out.contains("setenv GREETING_NASH\n"), "{out}");
    assert!(out.contains("fn f(a) {\n\techo $a\n}\n"), "{out}");
    assert!(out.contains("bindfn f ff\n"), "{out}");
}

#[tokio::test]
async fn eval_dump_replays() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("state.sh");
    let bare = || {
        let path = std::env::var("PATH").unwrap_or_default();
        Shell::new(ShellConfig::default().with_env(vec![("PATH".into(), path)]))
    };

    let script = format!(
        r#"var l = (a "b c"); fn f(x) {{ echo got $x }}; dump "{}""#,
        file.display()
    );
    bare().exec("dump", &script).await.unwrap();

    let dumped = std::fs::read_to_string(&file).unwrap();
    let replay = format!("{dumped}\nf($l[1])");
    let shell = bare();
    let out = OutputBuffer::new();
    shell.set_stdout(Sink::Buffer(out.clone()));
    shell.exec("replay", &replay).await.unwrap();
    assert_eq!(out.contents(), "got b c\n");
}

use std::process::{Command, Output};

use rstest::rstest;

fn videc_bench(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_videc-bench"))
        .args(args)
        .env("VIDEC_BENCH_PAUSE_SECS", "0")
        .output()
        .unwrap()
}

#[rstest]
#[case::no_arguments(&[], "Usage: videc-bench")]
#[case::missing_warmup(&["all", "clip.h264"], "Usage: videc-bench")]
#[case::unknown_decoder(&["ffmpeg", "clip.h264", "0"], "ffmpeg")]
#[case::non_integer_warmup(&["openh264", "clip.h264", "ten"], "ten")]
fn usage_errors_exit_one_with_message_on_stdout(#[case] args: &[&str], #[case] needle: &str) {
    let output = videc_bench(args);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1), "stdout: {stdout}");
    assert!(stdout.contains(needle), "stdout: {stdout}");
    assert!(output.stderr.is_empty());
}

#[rstest]
#[case("--help")]
#[case("-h")]
fn help_exits_zero(#[case] flag: &str) {
    let output = videc_bench(&[flag]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout.contains("Usage: videc-bench"), "stdout: {stdout}");
    assert!(stdout.contains("--warmup-runs"));
}

#[test]
fn version_exits_zero() {
    let output = videc_bench(&["--version"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}

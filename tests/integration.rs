use std::{env, fs, path::PathBuf, process::Command};

fn run_bin(args: &[&str]) -> std::process::Output {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_traysim"));

    Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command")
}

fn assert_success(args: &[&str]) {
    let output = run_bin(args);

    let stdout_str =
        std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
    let stderr_str =
        std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

    assert!(
        output.status.success(),
        "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
    );
}

fn prepare_dir(name: &str, config_contents: &str) -> PathBuf {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name);

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");
    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");

    test_dir
}

#[test]
fn basic_workflow() {
    let config_contents = String::new()
        + "[disease]\n"
        + "prob_trans = 0.0666666667\n"
        + "prevalence = 0.01\n"
        + "rec_rate = 1.0\n"
        + "\n"
        + "[trays]\n"
        + "dt = 0.1\n"
        + "max_steps = 2048\n"
        + "n_trays = 40\n"
        + "people = 2000\n"
        + "\n"
        + "[sweep]\n"
        + "uptake = \"threat-increasing\"\n"
        + "prevalences = [ 0.9, 0.01, 0.0001,]\n";
    let test_dir = prepare_dir("basic_workflow", &config_contents);

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    assert_success(&["--out-dir", test_dir_str, "simulate", "--seed", "7"]);
    assert_success(&[
        "--out-dir",
        test_dir_str,
        "simulate",
        "--seed",
        "7",
        "--replicates",
        "2",
    ]);
    assert!(test_dir.join("trajectory-0000.msgpack").is_file());
    assert!(test_dir.join("trajectory-0002.msgpack").is_file());

    assert_success(&["--out-dir", test_dir_str, "sweep", "--seed", "3"]);
    assert!(test_dir.join("sweep.msgpack").is_file());

    assert_success(&["--out-dir", test_dir_str, "prevalence", "--seed", "3"]);
    assert!(test_dir.join("prevalence.msgpack").is_file());
    assert!(test_dir.join("figure-prevalence-0002.msgpack").is_file());

    assert_success(&["--out-dir", test_dir_str, "analyze"]);
    assert!(test_dir.join("results.msgpack").is_file());

    assert_success(&["--out-dir", test_dir_str, "clean"]);
    assert!(!test_dir.join("results.msgpack").exists());
    assert!(!test_dir.join("trajectory-0000.msgpack").exists());
    assert!(test_dir.join("config.toml").is_file());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn invalid_config_fails() {
    let test_dir = prepare_dir("invalid_config", "[trays]\nn_trays = 4\ninit_contaminated = 5\n");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    let output = run_bin(&["--out-dir", test_dir_str, "simulate"]);
    assert!(!output.status.success());

    let output = run_bin(&["--out-dir", test_dir_str, "analyze"]);
    assert!(!output.status.success());

    fs::remove_dir_all(&test_dir).ok();
}

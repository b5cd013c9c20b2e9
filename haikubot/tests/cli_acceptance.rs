use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn write_config(&self, content: &str) -> PathBuf {
        let path = self.xdg_config.join("haikubot/config.toml");
        fs::create_dir_all(path.parent().expect("missing config parent"))
            .expect("failed to create config dir");
        fs::write(&path, content).expect("failed to write config");
        path
    }
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("haikubot"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("HAIKUBOT_NSEC")
        .env_remove("HEARTBEAT_URL")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute haikubot: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "haikubot {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

#[test]
fn version_prints_package_version() {
    let env = CliTestEnv::new();
    let args = ["--version"];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("haikubot {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_flag_detects_haiku() {
    let env = CliTestEnv::new();
    let args = ["-t", "古池や蛙飛び込む水の音", "https://example.com", "#haiku"];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec!["古池や蛙飛び込む水の音", "HAIKU!"]);
}

#[test]
fn test_flag_with_verbose_traces_classifier() {
    let env = CliTestEnv::new();
    let args = ["-t", "-V", "古池や蛙飛び込む水の音"];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.trim_end().ends_with("HAIKU!"), "got:\n{stdout}");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("pattern [5, 7, 5]"), "got:\n{stderr}");
    assert!(stderr.contains("pattern [5, 7, 5, 7, 7]"), "got:\n{stderr}");
    assert!(stderr.contains("[identity]"), "got:\n{stderr}");
    assert!(stderr.contains(": match"), "got:\n{stderr}");
}

#[test]
fn test_flag_without_verbose_prints_no_trace() {
    let env = CliTestEnv::new();
    let args = ["-t", "古池や蛙飛び込む水の音"];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("pattern ["), "got:\n{stderr}");
}

#[test]
fn test_flag_detects_tanka() {
    let env = CliTestEnv::new();
    let args = ["-t", "春過ぎて夏来にけらし白妙の衣干すてふ天の香具山"];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.trim_end().ends_with("TANKA!"),
        "expected tanka verdict, got:\n{stdout}"
    );
}

#[test]
fn test_flag_prints_only_normalized_text_without_match() {
    let env = CliTestEnv::new();
    let args = ["-t", "おはよう", "#nostr"];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "おはよう");
}

#[test]
fn test_flag_uses_user_dictionary_from_config() {
    let env = CliTestEnv::new();
    let dictionary = env.xdg_config.join("haikubot/userdic.csv");
    fs::create_dir_all(dictionary.parent().expect("missing dictionary parent"))
        .expect("failed to create dictionary dir");
    fs::write(&dictionary, "鯖缶,鯖缶,サバカン,名詞\n").expect("failed to write dictionary");
    env.write_config(&format!(
        "[classifier]\nuser_dictionary = {:?}\n",
        dictionary.display().to_string()
    ));

    let args = ["-t", "鯖缶や かわずとびこむ みずのおと"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("HAIKU!"), "expected haiku verdict, got:\n{stdout}");
}

#[test]
fn run_without_secret_key_refuses_to_start() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &[]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("secret key"),
        "expected missing key error, got:\n{stderr}"
    );
}

#[test]
fn run_with_invalid_relay_refuses_to_start() {
    let env = CliTestEnv::new();
    let config = env.write_config("[publish]\nrelays = [\"https://not-a-relay.example.com\"]\n");
    let config_arg = config.display().to_string();

    let output = run_bin(&env, &["--config", &config_arg]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("invalid configuration"),
        "expected configuration error, got:\n{stderr}"
    );
}

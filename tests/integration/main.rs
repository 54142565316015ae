//! Integration tests for Dockhand

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    /// Binary isolated from the host's CI environment
    fn dockhand(temp: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("dockhand");
        cmd.env("DOCKHAND_CONFIG", temp.join("config.toml"))
            .env_remove("GITHUB_ACTIONS")
            .env_remove("GITHUB_STATE")
            .env_remove("GITHUB_OUTPUT")
            .env_remove("DOCKHAND_STATE_FILE")
            .env_remove("INPUT_REPOSITORY")
            .env_remove("INPUT_CACHE")
            .env_remove("INPUT_REGISTRIES");
        cmd
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        dockhand(temp.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("container image build"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        dockhand(temp.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("dockhand"));
    }

    #[test]
    fn run_help_lists_inputs() {
        let temp = TempDir::new().unwrap();
        dockhand(temp.path())
            .args(["run", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--skip-tag-with-prefix"))
            .stdout(predicate::str::contains("--cache-key"));
    }

    #[test]
    fn classify_private_ecr() {
        let temp = TempDir::new().unwrap();
        dockhand(temp.path())
            .args(["classify", "123456789012.dkr.ecr.eu-west-1.amazonaws.com/team/app"])
            .assert()
            .success()
            .stdout(predicate::str::contains("ecr-private"))
            .stdout(predicate::str::contains("eu-west-1"))
            .stdout(predicate::str::contains("team/app"))
            .stdout(predicate::str::contains("aws cli"));
    }

    #[test]
    fn classify_custom_registry_keeps_port() {
        let temp = TempDir::new().unwrap();
        dockhand(temp.path())
            .args(["classify", "registry.example.com:5000/org/app"])
            .assert()
            .success()
            .stdout(predicate::str::contains("custom"))
            .stdout(predicate::str::contains("registry.example.com:5000"))
            .stdout(predicate::str::contains("username/password"));
    }

    #[test]
    fn classify_public_ecr_region_from_config() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("config.toml"),
            "[ecr]\npublic_region = \"eu-central-1\"\n",
        )
        .unwrap();

        dockhand(temp.path())
            .args(["classify", "public.ecr.aws/org/app"])
            .assert()
            .success()
            .stdout(predicate::str::contains("ecr-public"))
            .stdout(predicate::str::contains("eu-central-1"));
    }

    #[test]
    fn classify_dockerhub() {
        let temp = TempDir::new().unwrap();
        dockhand(temp.path())
            .args(["classify", "org/app"])
            .assert()
            .success()
            .stdout(predicate::str::contains("dockerhub"))
            .stdout(predicate::str::contains("docker.io"));
    }

    #[test]
    fn classify_invalid_address() {
        let temp = TempDir::new().unwrap();
        dockhand(temp.path())
            .args(["classify", "_app"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Could not determine registry"));
    }

    #[test]
    fn invalid_config_is_reported() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("config.toml"), "[ecr\n").unwrap();

        dockhand(temp.path())
            .args(["classify", "org/app"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn main_without_repository_fails_but_marks_post() {
        let temp = TempDir::new().unwrap();
        let state = temp.path().join("state.json");

        dockhand(temp.path())
            .args(["run", "--state-file"])
            .arg(&state)
            .assert()
            .failure()
            .stderr(predicate::str::contains("repository"));

        let content = std::fs::read_to_string(&state).unwrap();
        assert!(content.contains("\"isPost\": \"true\""));
    }

    #[test]
    fn post_with_empty_state_succeeds() {
        let temp = TempDir::new().unwrap();
        let state = temp.path().join("state.json");
        std::fs::write(
            &state,
            r#"{"values": {"isPost": "true"}, "updated_at": "2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        dockhand(temp.path())
            .args(["run", "--state-file"])
            .arg(&state)
            .assert()
            .success();

        assert!(!state.exists());
    }

    #[test]
    fn post_reads_state_from_actions_environment() {
        let temp = TempDir::new().unwrap();

        dockhand(temp.path())
            .arg("run")
            .env("GITHUB_STATE", temp.path().join("state"))
            .env("STATE_isPost", "true")
            .assert()
            .success();
    }

    #[test]
    fn group_headers_stay_off_stdout() {
        let temp = TempDir::new().unwrap();
        let state = temp.path().join("state.json");
        std::fs::write(
            &state,
            r#"{
                "values": {"isPost": "true", "registry": "registry.invalid"},
                "updated_at": "2024-01-01T00:00:00Z"
            }"#,
        )
        .unwrap();

        // No docker on PATH: logout fails and is reported as a warning
        dockhand(temp.path())
            .args(["run", "--state-file"])
            .arg(&state)
            .env("PATH", temp.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("Logging out").not())
            .stderr(predicate::str::contains("Logging out"));
    }
}

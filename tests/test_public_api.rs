//! Public API boundary tests: everything here is imported from the crate root.

use devgen::{
    CliArgs, Config, DevgenError, ExitCode, InMemoryStore, PipelineSettings, Provenance,
    UserFriendlyError, validate_compose, validate_devcontainer,
};

#[test]
fn test_exit_codes_are_stable() {
    assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
    assert_eq!(ExitCode::INTERNAL.as_i32(), 1);
    assert_eq!(ExitCode::INVALID_INPUT.as_i32(), 2);
    assert_eq!(ExitCode::TRANSPORT.as_i32(), 3);
    assert_eq!(ExitCode::GENERATION_EXHAUSTED.as_i32(), 4);
    assert_eq!(ExitCode::PERSISTENCE.as_i32(), 5);
}

#[test]
fn test_provenance_labels() {
    assert_eq!(Provenance::Database.to_string(), "database");
    assert_eq!(Provenance::Repository.to_string(), "repository");
    assert_eq!(Provenance::Generated.to_string(), "generated");
}

#[test]
fn test_settings_follow_configuration() {
    let dir = tempfile::TempDir::new().unwrap();
    let args = CliArgs {
        max_retries: Some(4),
        max_depth: Some(2),
        ..CliArgs::default()
    };
    let config = Config::discover_from(dir.path(), &args, &|key| match key {
        "MODEL" => Some("gpt-4o".to_string()),
        _ => None,
    })
    .unwrap();

    let settings = PipelineSettings::from_config(&config).unwrap();
    assert_eq!(settings.max_depth, 2);
    assert_eq!(settings.generation.max_retries, 4);
    assert_eq!(settings.generation.model, "gpt-4o");
}

#[test]
fn test_invalid_url_error_is_user_facing() {
    let err = DevgenError::Repo(devgen::utils::error::RepoError::InvalidRepositoryUrl {
        url: "ftp://acme/widgets".to_string(),
    });
    assert!(err.user_message().contains("ftp://acme/widgets"));
    assert!(err.display_for_user().starts_with("[Invalid Input]"));
}

#[test]
fn test_validators_never_panic_on_garbage() {
    let _store = InMemoryStore::new();
    for input in ["", "null", "[]", "{", "\u{0}", "services: [", "{\"name\": 1}"] {
        assert!(!validate_devcontainer(input));
        let _ = validate_compose(input);
    }
    assert!(validate_compose("services:\n  app:\n    image: python:3.11\n"));
}

use super::load_existing_config as load_existing_config_impl;
use super::*;
use tempfile::TempDir;

#[test]
fn load_existing_config_falls_back_to_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = load_existing_config_impl(temp_dir.path());

    assert_eq!(config, Config::with_base_dir(temp_dir.path()));
}

#[test]
fn load_existing_config_reads_saved_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut saved = Config::with_base_dir(temp_dir.path());
    saved.generator.model = "mistral:7b".to_string();
    saved.save().expect("should save config");

    let config = load_existing_config_impl(temp_dir.path());

    assert_eq!(config.generator.model, "mistral:7b");
}

#[test]
fn show_config_with_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    assert!(show_config(temp_dir.path()).is_ok());
}

#[test]
fn unreachable_ollama_is_reported_as_unavailable() {
    let endpoint = url::Url::parse("http://127.0.0.1:9/").expect("url should parse");

    assert!(!test_ollama_connection(&endpoint));
}

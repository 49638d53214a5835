//! Download retries, mirror fallback and interruption.
#![cfg(unix)]

mod common;

use common::{config, FakeRunner, Reply, ScriptedFetcher};
use grars_setup::{
    error::InstallerErrorKind, inst::Installer, os::Interrupt, prompt::AutoConfirm,
};

#[test_log::test]
fn test_transient_failure_retried_once() {
    let home = tempfile::tempdir().unwrap();
    let config = config(home.path());
    let fetcher = ScriptedFetcher::default();
    let asset_url = config.release_asset_url("v0.9.0");
    fetcher.reply(&asset_url, Reply::Status(503));

    let report = Installer::new(&config)
        .unwrap()
        .with_fetcher(fetcher.clone())
        .with_runner(FakeRunner::default())
        .run(&mut AutoConfirm)
        .unwrap();

    assert!(report.is_clean(), "{:?}", report.warnings);
    assert_eq!(fetcher.count(&asset_url), 2);
    assert!(grars_setup::os::is_executable_file(
        &config.resolver.binary_path()
    ));
}

#[test_log::test]
fn test_transient_failure_gives_up_after_second_attempt() {
    let home = tempfile::tempdir().unwrap();
    let config = config(home.path());
    let fetcher = ScriptedFetcher::default();
    let asset_url = config.release_asset_url("v0.9.0");
    fetcher.reply(&asset_url, Reply::Status(503));
    fetcher.reply(&asset_url, Reply::Status(502));

    let error = Installer::new(&config)
        .unwrap()
        .with_fetcher(fetcher.clone())
        .with_runner(FakeRunner::default())
        .run(&mut AutoConfirm)
        .unwrap_err();

    assert!(matches!(error.kind(), InstallerErrorKind::DownloadFailure));
    assert_eq!(fetcher.count(&asset_url), 2);
    assert!(!config.resolver.binary_path().exists());
}

#[test_log::test]
fn test_model_mirror_fallback() {
    let home = tempfile::tempdir().unwrap();
    let config = config(home.path());
    let fetcher = ScriptedFetcher::default();
    let (weights, _) = config.resolver.model_files(&config.model_name);
    let file_name = weights.file_name().unwrap().to_string_lossy().into_owned();
    let urls = config.model_urls(&file_name);
    assert_eq!(urls.len(), 2);
    fetcher.reply(&urls[0], Reply::Status(404));

    let report = Installer::new(&config)
        .unwrap()
        .with_fetcher(fetcher.clone())
        .with_runner(FakeRunner::default())
        .run(&mut AutoConfirm)
        .unwrap();

    assert!(report.is_clean(), "{:?}", report.warnings);
    // Not retried: a missing file stays missing.
    assert_eq!(fetcher.count(&urls[0]), 1);
    assert_eq!(fetcher.count(&urls[1]), 1);
    assert!(std::fs::read_to_string(&weights)
        .unwrap()
        .contains(urls[1].as_str()));
}

#[test_log::test]
fn test_interrupt_during_download() {
    let home = tempfile::tempdir().unwrap();
    let config = config(home.path());
    let fetcher = ScriptedFetcher::default();
    let interrupt = Interrupt::new();
    let asset_url = config.release_asset_url("v0.9.0");
    fetcher.reply(&asset_url, Reply::RaiseInterrupt(interrupt.clone()));

    let error = Installer::new(&config)
        .unwrap()
        .with_fetcher(fetcher.clone())
        .with_runner(FakeRunner::default())
        .with_interrupt(interrupt)
        .run(&mut AutoConfirm)
        .unwrap_err();

    assert!(matches!(error.kind(), InstallerErrorKind::Interrupted));
    assert_eq!(fetcher.count(&asset_url), 1);
    assert!(!config.resolver.binary_path().exists());
    assert_eq!(
        std::fs::read_dir(config.resolver.bin_dir()).unwrap().count(),
        0
    );

    let manifest = grars_setup::manifest(&config).unwrap();
    assert!(manifest.files.is_empty());
    assert!(manifest
        .dirs
        .iter()
        .any(|dir| dir.path == config.resolver.data_dir()));
}

//! Installing into and removing from a temporary home directory.
#![cfg(unix)]

mod common;

use common::{config, write_executable, FakeFetcher, FakeRunner};
use grars_setup::{
    error::InstallerErrorKind,
    inst::{InstallConfig, Installer},
    manifest::TargetKind,
    net::OfflineFetcher,
    prompt::AutoConfirm,
    uninst::Uninstaller,
};

fn installer(config: &InstallConfig, fetcher: &FakeFetcher, runner: &FakeRunner) -> Installer {
    Installer::new(config)
        .unwrap()
        .with_fetcher(fetcher.clone())
        .with_runner(runner.clone())
}

fn assert_complete(config: &InstallConfig) {
    let resolver = &config.resolver;
    let (weights, metadata) = resolver.model_files(&config.model_name);

    assert!(grars_setup::os::is_executable_file(&resolver.binary_path()));
    assert!(grars_setup::os::is_executable_file(&resolver.runtime_python()));
    assert!(weights.is_file());
    assert!(metadata.is_file());
    assert!(resolver.ocr_helper_path().unwrap().is_file());
    assert!(resolver.shortcut_path().is_file());
    assert!(resolver.config_file().is_file());
    assert!(resolver.manifest_path().is_file());
    assert_eq!(
        std::fs::read_link(resolver.link_path().unwrap()).unwrap(),
        resolver.binary_path()
    );
}

#[test_log::test]
fn test_second_install_is_noop() {
    let home = tempfile::tempdir().unwrap();
    let config = config(home.path());
    let fetcher = FakeFetcher::default();
    let runner = FakeRunner::default();

    let report = installer(&config, &fetcher, &runner)
        .run(&mut AutoConfirm)
        .unwrap();

    assert!(report.is_clean(), "{:?}", report.warnings);
    assert_complete(&config);

    let requests = fetcher.request_count();
    let config_contents = std::fs::read(config.resolver.config_file()).unwrap();
    let mut installer = installer(&config, &fetcher, &runner);

    assert!(installer.plan().is_empty());

    let report = installer.run(&mut AutoConfirm).unwrap();

    assert!(report.completed.is_empty());
    assert_eq!(report.skipped.len(), 7);
    assert_eq!(fetcher.request_count(), requests);
    assert_eq!(runner.venv_count(), 1);
    assert_eq!(
        std::fs::read(config.resolver.config_file()).unwrap(),
        config_contents
    );
}

#[test_log::test]
fn test_uninstall_then_install() {
    let home = tempfile::tempdir().unwrap();
    let config = config(home.path());
    let fetcher = FakeFetcher::default();
    let runner = FakeRunner::default();

    installer(&config, &fetcher, &runner)
        .run(&mut AutoConfirm)
        .unwrap();

    let report = Uninstaller::new(&config).run(&mut AutoConfirm).unwrap();

    assert!(report.kept.is_empty(), "{:?}", report.kept);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert!(!config.resolver.data_dir().exists());
    assert!(!config.resolver.config_dir().exists());
    assert!(!config.resolver.link_path().unwrap().exists());
    assert!(!config.resolver.shortcut_path().exists());

    let error = Uninstaller::new(&config).run(&mut AutoConfirm).unwrap_err();
    assert!(matches!(error.kind(), InstallerErrorKind::NotInstalled));

    let report = installer(&config, &fetcher, &runner)
        .run(&mut AutoConfirm)
        .unwrap();

    assert!(report.is_clean(), "{:?}", report.warnings);
    assert_complete(&config);
    assert!(installer(&config, &fetcher, &runner).plan().is_empty());
}

#[test_log::test]
fn test_uninstall_containment() {
    let home = tempfile::tempdir().unwrap();
    let config = config(home.path());
    let resolver = &config.resolver;
    let fetcher = FakeFetcher::default();
    let runner = FakeRunner::default();

    let other_tool = home.path().join(".local/bin/other-tool");
    let other_app = home.path().join(".local/share/other-app/data.txt");
    let user_notes = home.path().join("notes.txt");
    write_executable(&other_tool, "#!/bin/sh\n");
    std::fs::create_dir_all(other_app.parent().unwrap()).unwrap();
    std::fs::write(&other_app, "keep").unwrap();
    std::fs::write(&user_notes, "keep").unwrap();

    installer(&config, &fetcher, &runner)
        .run(&mut AutoConfirm)
        .unwrap();

    let user_file = resolver.data_dir().join("recordings.txt");
    std::fs::write(&user_file, "mine").unwrap();
    std::fs::write(resolver.config_file(), "{\"log_level\": \"debug\"}").unwrap();

    let report = Uninstaller::new(&config).run(&mut AutoConfirm).unwrap();

    assert_eq!(report.kept.len(), 1);
    assert_eq!(report.kept[0].path, resolver.config_file());

    assert!(other_tool.is_file());
    assert!(other_app.is_file());
    assert!(user_notes.is_file());
    assert!(user_file.is_file());
    assert!(resolver.config_file().is_file());
    assert!(!resolver.binary_path().exists());
    assert!(!resolver.runtime_dir().exists());
    assert!(!resolver.models_dir().exists());
    assert!(!resolver.link_path().unwrap().exists());
    // Existed before installing.
    assert!(resolver.link_dir().unwrap().is_dir());

    // The rewritten manifest still protects the modified configuration.
    let manifest = grars_setup::manifest(&config).unwrap();
    assert_eq!(manifest.files.len(), 1);
    assert_eq!(manifest.files[0].kind, TargetKind::Config);

    let report = Uninstaller::new(&config).run(&mut AutoConfirm).unwrap();
    assert!(resolver.config_file().is_file());
    assert_eq!(report.kept.len(), 1);
}

#[test_log::test]
fn test_force_replaces_runtime() {
    let home = tempfile::tempdir().unwrap();
    let mut config = config(home.path());
    let fetcher = FakeFetcher::default();
    let runner = FakeRunner::default();

    installer(&config, &fetcher, &runner)
        .run(&mut AutoConfirm)
        .unwrap();

    let marker = config.resolver.runtime_dir().join("marker");
    std::fs::write(&marker, "old environment").unwrap();
    let user_config = "{\"log_level\": \"debug\", \"voice_model\": \"custom\"}";
    std::fs::write(config.resolver.config_file(), user_config).unwrap();

    config.flags.force = true;
    let report = installer(&config, &fetcher, &runner)
        .run(&mut AutoConfirm)
        .unwrap();

    assert!(report.is_clean(), "{:?}", report.warnings);
    assert!(!marker.exists());
    assert_eq!(runner.venv_count(), 2);
    assert_complete(&config);
    assert_eq!(
        std::fs::read_to_string(config.resolver.config_file()).unwrap(),
        user_config
    );
}

#[test_log::test]
fn test_invalid_runtime_is_rebuilt() {
    let home = tempfile::tempdir().unwrap();
    let config = config(home.path());
    let fetcher = FakeFetcher::default();
    let runner = FakeRunner::default();

    installer(&config, &fetcher, &runner)
        .run(&mut AutoConfirm)
        .unwrap();

    std::fs::remove_file(config.resolver.runtime_executable("piper")).unwrap();

    let report = installer(&config, &fetcher, &runner)
        .run(&mut AutoConfirm)
        .unwrap();

    assert_eq!(report.completed.len(), 2);
    assert_eq!(runner.venv_count(), 2);
    assert!(grars_setup::os::is_executable_file(
        &config.resolver.runtime_executable("piper")
    ));
}

#[test_log::test]
fn test_offline_without_local_binary_fails() {
    let home = tempfile::tempdir().unwrap();
    let config = config(home.path());

    let error = Installer::new(&config)
        .unwrap()
        .with_fetcher(OfflineFetcher)
        .with_runner(FakeRunner::default())
        .run(&mut AutoConfirm)
        .unwrap_err();

    assert!(matches!(error.kind(), InstallerErrorKind::DownloadFailure));

    let bin_dir = config.resolver.bin_dir();
    assert!(!config.resolver.binary_path().exists());
    assert_eq!(std::fs::read_dir(&bin_dir).unwrap().count(), 0);

    // Saved so a later uninstall removes the directories.
    assert!(config.resolver.manifest_path().is_file());
    Uninstaller::new(&config).run(&mut AutoConfirm).unwrap();
    assert!(!config.resolver.data_dir().exists());
}

#[test_log::test]
fn test_local_sources_offline() {
    let home = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let mut config = config(home.path());
    config.project_root = Some(project.path().to_path_buf());

    write_executable(
        &project.path().join("target/release/grars"),
        "#!/bin/sh\necho local build\n",
    );
    std::fs::create_dir_all(project.path().join("install")).unwrap();
    std::fs::write(
        project.path().join("install/extract_text_from_image.py"),
        "print('local helper')\n",
    )
    .unwrap();

    let report = Installer::new(&config)
        .unwrap()
        .with_fetcher(OfflineFetcher)
        .with_runner(FakeRunner::default())
        .run(&mut AutoConfirm)
        .unwrap();

    // Only the model needs the network.
    assert_eq!(report.warnings.len(), 1);
    assert!(matches!(
        report.warnings[0].action,
        grars_setup::inst::Action::DownloadModel { .. }
    ));
    assert_eq!(
        std::fs::read_to_string(config.resolver.binary_path()).unwrap(),
        "#!/bin/sh\necho local build\n"
    );
    assert_eq!(
        std::fs::read_to_string(config.resolver.ocr_helper_path().unwrap()).unwrap(),
        "print('local helper')\n"
    );

    let (weights, _) = config.resolver.model_files(&config.model_name);
    assert!(!weights.exists());
    assert_eq!(
        std::fs::read_dir(config.resolver.models_dir()).unwrap().count(),
        0
    );
}

#[test_log::test]
fn test_skip_flags() {
    let home = tempfile::tempdir().unwrap();
    let mut config = config(home.path());
    config.flags.skip_runtime = true;
    config.flags.skip_engine = true;
    config.flags.skip_shortcuts = true;
    let fetcher = FakeFetcher::default();
    let runner = FakeRunner::default();

    installer(&config, &fetcher, &runner)
        .run(&mut AutoConfirm)
        .unwrap();

    assert!(config.resolver.binary_path().is_file());
    assert!(!config.resolver.runtime_dir().exists());
    assert!(!config.resolver.models_dir().exists());
    assert!(!config.resolver.shortcut_path().exists());
    assert_eq!(runner.venv_count(), 0);
    assert!(!config.resolver.ocr_helper_path().unwrap().exists());
}

#[test_log::test]
fn test_uninstall_keeps_runtime_it_did_not_create() {
    let home = tempfile::tempdir().unwrap();
    let mut config = config(home.path());
    config.flags.skip_runtime = true;
    let fetcher = FakeFetcher::default();
    let runner = FakeRunner::default();

    installer(&config, &fetcher, &runner)
        .run(&mut AutoConfirm)
        .unwrap();

    let runtime_dir = config.resolver.runtime_dir();
    let user_package = runtime_dir.join("lib/user-package.py");
    std::fs::create_dir_all(user_package.parent().unwrap()).unwrap();
    std::fs::write(&user_package, "print('mine')\n").unwrap();

    let report = Uninstaller::new(&config).run(&mut AutoConfirm).unwrap();

    assert!(user_package.is_file());
    assert!(!config.resolver.binary_path().exists());
    assert!(report
        .kept
        .iter()
        .any(|kept| kept.path == runtime_dir && kept.reason == "not installed by this installer"));
}

#[test_log::test]
fn test_foreign_link_left_alone() {
    let home = tempfile::tempdir().unwrap();
    let config = config(home.path());
    let fetcher = FakeFetcher::default();
    let runner = FakeRunner::default();

    let own_build = home.path().join("src/grars/target/release/grars");
    write_executable(&own_build, "#!/bin/sh\necho own build\n");
    let link_path = config.resolver.link_path().unwrap();
    std::fs::create_dir_all(link_path.parent().unwrap()).unwrap();
    std::os::unix::fs::symlink(&own_build, &link_path).unwrap();

    let report = installer(&config, &fetcher, &runner)
        .run(&mut AutoConfirm)
        .unwrap();

    assert_eq!(report.warnings.len(), 1);
    assert!(matches!(
        report.warnings[0].action,
        grars_setup::inst::Action::LinkPathEntry { .. }
    ));
    assert_eq!(std::fs::read_link(&link_path).unwrap(), own_build);
    assert!(config.resolver.binary_path().is_file());

    let report = Uninstaller::new(&config).run(&mut AutoConfirm).unwrap();

    assert_eq!(std::fs::read_link(&link_path).unwrap(), own_build);
    assert!(own_build.is_file());
    assert!(report.kept.iter().any(|kept| kept.path == link_path));
}

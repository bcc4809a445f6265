use std::fs;

use microhabits::installer::{install, uninstall, InstallTarget};

fn snapshot(root: &std::path::Path) -> Vec<String> {
    let mut entries = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path.clone());
            } else {
                entries.push(path.strip_prefix(root).unwrap().display().to_string());
            }
        }
    }
    entries.sort();
    entries
}

#[test]
fn install_then_uninstall_restores_files() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("build").join("habits");
    fs::create_dir_all(src.parent().unwrap()).unwrap();
    fs::write(&src, "binary").unwrap();
    let stage = tmp.path().join("stage");
    fs::create_dir_all(stage.join("usr/bin")).unwrap();
    fs::write(stage.join("usr/bin/other"), "untouched").unwrap();
    let target = InstallTarget::new(stage.to_string_lossy(), "/usr");

    let before = snapshot(&stage);
    let dest = install(&src, &target).unwrap();
    assert_eq!(dest, stage.join("usr/bin/habits"));
    assert!(dest.exists());

    assert!(uninstall(&target).unwrap());
    assert_eq!(snapshot(&stage), before);
    assert_eq!(fs::read_to_string(stage.join("usr/bin/other")).unwrap(), "untouched");
}

#[test]
fn install_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("habits");
    fs::write(&src, "binary").unwrap();
    let target = InstallTarget::new(tmp.path().join("stage").to_string_lossy(), "/opt/habits");

    let first = install(&src, &target).unwrap();
    let first_meta = fs::metadata(&first).unwrap();
    let second = install(&src, &target).unwrap();
    let second_meta = fs::metadata(&second).unwrap();

    assert_eq!(first, second);
    assert_eq!(fs::read(&second).unwrap(), b"binary");
    assert_eq!(first_meta.permissions(), second_meta.permissions());
    assert_eq!(first_meta.len(), second_meta.len());
}

#[test]
fn uninstall_twice_succeeds() {
    let tmp = tempfile::tempdir().unwrap();
    let target = InstallTarget::new(tmp.path().to_string_lossy(), "/usr/local");

    assert!(!uninstall(&target).unwrap());
    assert!(!uninstall(&target).unwrap());
}

#[test]
fn overridden_prefix_is_used_instead_of_default() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("habits");
    fs::write(&src, "binary").unwrap();
    let stage = tmp.path().join("stage");

    install(&src, &InstallTarget::new(stage.to_string_lossy(), "/custom")).unwrap();

    assert!(stage.join("custom/bin/habits").exists());
    assert!(!stage.join("usr/local/bin/habits").exists());
}

use std::error::Error;
use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn mkdir_upload_and_list_with_filter() -> Result<(), Box<dyn Error>> {
    let data = tempdir()?;
    let files = tempdir()?;
    let small = write_file(files.path(), "small.mp4", 10)?;
    let big = write_file(files.path(), "big.mkv", 400)?;
    let notes = write_file(files.path(), "notes.txt", 9000)?;

    let output = cli(data.path())?.args(["tree", "mkdir", "clips"]).output()?;
    assert!(output.status.success());
    let folder = last_id(&String::from_utf8(output.stdout)?)?;

    cli(data.path())?
        .args(["tree", "upload", "--parent", &folder])
        .args([&small, &big, &notes])
        .assert()
        .success()
        .stdout(predicate::str::contains("Uploaded 'big.mkv'"));

    let output = cli(data.path())?
        .args(["tree", "list", &folder, "--filter", "videos", "--sort", "size"])
        .output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    let names: Vec<_> = stdout
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().last())
        .collect();
    assert_eq!(names, vec!["big.mkv", "small.mp4"]);
    assert!(stdout.starts_with("My Files / clips [Videos / size]"));
    Ok(())
}

#[test]
fn list_remembers_view_choices() -> Result<(), Box<dyn Error>> {
    let data = tempdir()?;
    cli(data.path())?
        .args(["tree", "list", "--filter", "pdf", "--sort", "month"])
        .assert()
        .success();

    cli(data.path())?
        .args(["tree", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[PDFs / month]"));
    assert!(data.path().join("dropdown-preferences.json").exists());
    Ok(())
}

#[test]
fn root_listing_shows_shared_folder() -> Result<(), Box<dyn Error>> {
    let data = tempdir()?;
    cli(data.path())?
        .args(["tree", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Shared"));
    Ok(())
}

#[test]
fn rename_rejects_blank_names() -> Result<(), Box<dyn Error>> {
    let data = tempdir()?;
    let output = cli(data.path())?.args(["tree", "mkdir", "draft"]).output()?;
    let folder = last_id(&String::from_utf8(output.stdout)?)?;

    cli(data.path())?
        .args(["tree", "rename", &folder, "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("name must not be empty"));

    cli(data.path())?
        .args(["tree", "rename", &folder, "final"])
        .assert()
        .success();
    cli(data.path())?
        .args(["tree", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("final"));
    Ok(())
}

#[test]
fn data_dir_can_come_from_environment() -> Result<(), Box<dyn Error>> {
    let data = tempdir()?;
    Command::cargo_bin("rustvault")?
        .env("RUSTVAULT_HOME", data.path())
        .args(["tree", "mkdir", "from-env"])
        .assert()
        .success();
    assert!(data.path().join("folder-tree-snapshot.json").exists());
    Ok(())
}

fn cli(data: &Path) -> Result<Command, Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("rustvault")?;
    cmd.env_remove("RUSTVAULT_HOME")
        .arg("--data-dir")
        .arg(data);
    Ok(cmd)
}

fn write_file(dir: &Path, name: &str, bytes: usize) -> Result<String, Box<dyn Error>> {
    let path = dir.join(name);
    fs::write(&path, vec![b'x'; bytes])?;
    Ok(path.to_string_lossy().into_owned())
}

fn last_id(stdout: &str) -> Result<String, Box<dyn Error>> {
    let start = stdout.rfind('(').ok_or("missing id")?;
    let end = stdout.rfind(')').ok_or("missing id")?;
    Ok(stdout[start + 1..end].to_string())
}

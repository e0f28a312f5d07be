use std::error::Error;
use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn share_without_recipients_is_rejected() -> Result<(), Box<dyn Error>> {
    let data = tempdir()?;
    let report = write_file(data.path(), "report.pdf")?;

    cli(data.path())?
        .args(["share", &report])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no recipients selected"));

    cli(data.path())?
        .args(["vault", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No vault entries"));
    Ok(())
}

#[test]
fn blank_recipient_is_rejected() -> Result<(), Box<dyn Error>> {
    let data = tempdir()?;
    let report = write_file(data.path(), "report.pdf")?;

    cli(data.path())?
        .args(["share", &report, "--to", "  "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("recipient must not be empty"));
    cli(data.path())?
        .args(["vault", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No vault entries"));
    Ok(())
}

#[test]
fn weak_password_lists_missing_rules() -> Result<(), Box<dyn Error>> {
    let data = tempdir()?;
    let report = write_file(data.path(), "report.pdf")?;

    cli(data.path())?
        .args(["share", &report, "--to", "a@x.com", "--password", "abcdef"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("a digit"))
        .stderr(predicate::str::contains("an uppercase letter"));
    Ok(())
}

#[test]
fn protected_share_lands_in_shared_folder() -> Result<(), Box<dyn Error>> {
    let data = tempdir()?;
    let report = write_file(data.path(), "report.pdf")?;

    let output = cli(data.path())?
        .args([
            "share",
            &report,
            "--to",
            "a@x.com",
            "--to",
            "b@x.com",
            "--password",
            "Aa1!aa",
        ])
        .output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("[password]"));
    assert!(stdout.contains("1 file(s) shared with 2 recipient(s)"));
    let id = first_id(&stdout)?;

    cli(data.path())?
        .args(["vault", "list", "--shared"])
        .assert()
        .success()
        .stdout(predicate::str::contains("locked"))
        .stdout(predicate::str::contains("2 recipient(s)"));

    cli(data.path())?
        .args(["vault", "verify", &id, "Aa1!aa"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Password accepted"));
    cli(data.path())?
        .args(["vault", "verify", &id, "aa1!aa"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("password rejected"));

    cli(data.path())?
        .args(["tree", "list", "shared"])
        .assert()
        .success()
        .stdout(predicate::str::contains("report.pdf"));

    cli(data.path())?
        .args(["notifications", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("file-shared").count(1));
    Ok(())
}

#[test]
fn recipients_file_supplies_display_names() -> Result<(), Box<dyn Error>> {
    let data = tempdir()?;
    fs::write(
        data.path().join("people.json"),
        r#"[{"identity":"ada@example.com","display_name":"Ada Lovelace"}]"#,
    )?;
    fs::write(
        data.path().join("config.json"),
        r#"{"recipients_file":"people.json"}"#,
    )?;
    let notes = write_file(data.path(), "notes.txt")?;

    let output = cli(data.path())?
        .args(["share", &notes, "--to", "ADA@example.com", "--permission", "edit"])
        .output()?;
    assert!(output.status.success());
    let id = first_id(&String::from_utf8(output.stdout)?)?;

    cli(data.path())?
        .args(["vault", "show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "shared:    ada@example.com (Ada Lovelace) [edit]",
        ));

    cli(data.path())?
        .args(["vault", "revoke", &id, "ada@example.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Revoked access"));
    Ok(())
}

fn cli(data: &Path) -> Result<Command, Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("rustvault")?;
    cmd.env_remove("RUSTVAULT_HOME")
        .arg("--data-dir")
        .arg(data);
    Ok(cmd)
}

fn write_file(dir: &Path, name: &str) -> Result<String, Box<dyn Error>> {
    let path = dir.join("inbox").join(name);
    fs::create_dir_all(path.parent().ok_or("no parent")?)?;
    fs::write(&path, b"payload")?;
    Ok(path.to_string_lossy().into_owned())
}

fn first_id(stdout: &str) -> Result<String, Box<dyn Error>> {
    let start = stdout.find('(').ok_or("missing id")?;
    let end = stdout[start..].find(')').ok_or("missing id")? + start;
    Ok(stdout[start + 1..end].to_string())
}

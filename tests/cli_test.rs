use assert_cmd::cargo; // Add methods on commands
use predicates::prelude::*; // Used for writing assertions
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

fn mkdsk(path: &std::path::Path,kind: &str) -> STDRESULT {
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("mkdsk")
        .arg("-k").arg(kind)
        .arg("-d").arg(path)
        .assert()
        .success();
    Ok(())
}

#[test]
fn mk_every_kind() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    for (kind,len) in [("360k",368640),("720k",737280),("1.2m",1228800),("1.44m",1474560),("dmf",1720320),("2.88m",2949120)] {
        let dimg_path = dir.path().join(format!("{}.img",kind));
        mkdsk(&dimg_path,kind)?;
        assert_eq!(std::fs::metadata(&dimg_path)?.len(),len);
    }
    Ok(())
}

#[test]
fn mk_bad_kind() -> STDRESULT {
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("bad.img");
    cmd.arg("mkdsk")
        .arg("-k").arg("100k")
        .arg("-d").arg(&dimg_path)
        .assert()
        .failure();
    assert!(!dimg_path.exists());
    Ok(())
}

#[test]
fn mk_refuses_existing() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("exists.img");
    mkdsk(&dimg_path,"720k")?;
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("mkdsk")
        .arg("-k").arg("1.44m")
        .arg("-d").arg(&dimg_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    assert_eq!(std::fs::metadata(&dimg_path)?.len(),737280);
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("mkdsk")
        .arg("-k").arg("1.44m").arg("--force")
        .arg("-d").arg(&dimg_path)
        .assert()
        .success();
    assert_eq!(std::fs::metadata(&dimg_path)?.len(),1474560);
    Ok(())
}

#[test]
fn put_get_catalog() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("songs.img");
    mkdsk(&dimg_path,"1.44m")?;
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("put")
        .arg("-f").arg("/My Favorite Song.mid")
        .arg("-d").arg(&dimg_path)
        .write_stdin("MThd and so on")
        .assert()
        .success();
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("get")
        .arg("-f").arg("/MYFAVO~1.MID")
        .arg("-d").arg(&dimg_path)
        .assert()
        .success()
        .stdout("MThd and so on");
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("get")
        .arg("-f").arg("/my favorite song.MID")
        .arg("-d").arg(&dimg_path)
        .assert()
        .success()
        .stdout("MThd and so on");
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("catalog")
        .arg("-d").arg(&dimg_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("MYFAVO~1 MID"))
        .stdout(predicate::str::contains("My Favorite Song.mid"))
        .stdout(predicate::str::contains("1 File(s)"));
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("ls")
        .arg("--raw")
        .arg("-d").arg(&dimg_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("LFN"))
        .stdout(predicate::str::contains("MYFAVO~1.MID"));
    Ok(())
}

#[test]
fn plain_short_names() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("plain.img");
    mkdsk(&dimg_path,"720k")?;
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("put")
        .arg("-f").arg("/My_Favorite_Song.mid")
        .arg("-d").arg(&dimg_path)
        .arg("--plain")
        .write_stdin("abc")
        .assert()
        .success();
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("get")
        .arg("-f").arg("/MY_FAVOR.MID")
        .arg("-d").arg(&dimg_path)
        .assert()
        .success()
        .stdout("abc");
    Ok(())
}

#[test]
fn replace_needs_force() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("replace.img");
    mkdsk(&dimg_path,"360k")?;
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("put").arg("-f").arg("/A.TXT").arg("-d").arg(&dimg_path)
        .write_stdin("first")
        .assert()
        .success();
    let before = std::fs::read(&dimg_path)?;
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("put").arg("-f").arg("/A.TXT").arg("-d").arg(&dimg_path)
        .write_stdin("second")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
    assert_eq!(std::fs::read(&dimg_path)?,before);
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("put").arg("-f").arg("/A.TXT").arg("-d").arg(&dimg_path).arg("--force")
        .write_stdin("second")
        .assert()
        .success();
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("get").arg("-f").arg("/a.txt").arg("-d").arg(&dimg_path)
        .assert()
        .success()
        .stdout("second");
    Ok(())
}

#[test]
fn failure_leaves_image_alone() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("full.img");
    mkdsk(&dimg_path,"360k")?;
    let before = std::fs::read(&dimg_path)?;
    let big = vec![0x55u8;400000];
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("put").arg("-f").arg("/BIG.BIN").arg("-d").arg(&dimg_path)
        .write_stdin(big)
        .assert()
        .failure();
    assert_eq!(std::fs::read(&dimg_path)?,before);
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("delete").arg("-f").arg("/NOSUCH.TXT").arg("-d").arg(&dimg_path)
        .write_stdin("")
        .assert()
        .failure();
    assert_eq!(std::fs::read(&dimg_path)?,before);
    Ok(())
}

#[test]
fn directories_and_moves() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("tree.img");
    mkdsk(&dimg_path,"1.44m")?;
    for sub in ["/DOCS","/DOCS/OLD"] {
        let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
        cmd.arg("mkdir").arg("-f").arg(sub).arg("-d").arg(&dimg_path)
            .assert()
            .success();
    }
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("put").arg("-f").arg("/DOCS/NOTE.TXT").arg("-d").arg(&dimg_path)
        .write_stdin("hello")
        .assert()
        .success();
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("mv").arg("-f").arg("/DOCS/NOTE.TXT").arg("-t").arg("/DOCS/OLD").arg("-d").arg(&dimg_path)
        .assert()
        .success();
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("rename").arg("-f").arg("/DOCS/OLD/NOTE.TXT").arg("-n").arg("Meeting Notes.txt").arg("-d").arg(&dimg_path)
        .assert()
        .success();
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("get").arg("-f").arg("/docs/old/Meeting Notes.txt").arg("-d").arg(&dimg_path)
        .assert()
        .success()
        .stdout("hello");
    // a directory cannot go inside itself
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("move").arg("-f").arg("/DOCS").arg("-t").arg("/DOCS/OLD").arg("-d").arg(&dimg_path)
        .assert()
        .failure();
    // not empty
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("delete").arg("-f").arg("/DOCS").arg("-d").arg(&dimg_path)
        .write_stdin("")
        .assert()
        .failure();
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("del").arg("-r").arg("-f").arg("/DOCS").arg("-d").arg(&dimg_path)
        .write_stdin("")
        .assert()
        .success();
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("catalog").arg("-d").arg(&dimg_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("No File"));
    Ok(())
}

#[test]
fn stat_and_fatmap() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("stat.img");
    mkdsk(&dimg_path,"1.44m")?;
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("put").arg("-f").arg("/TWO.BIN").arg("-d").arg(&dimg_path)
        .write_stdin(vec![1u8;600])
        .assert()
        .success();
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    let output = cmd.arg("stat").arg("-d").arg(&dimg_path).output()?;
    assert!(output.status.success());
    let obj = json::parse(&String::from_utf8(output.stdout)?)?;
    assert_eq!(obj["capacity"],"1.44M");
    assert_eq!(obj["bytesPerSector"],512);
    assert_eq!(obj["mediaDescriptor"],"F0");
    assert_eq!(obj["freeBytes"],(2847-2)*512);
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    let output = cmd.arg("fatmap").arg("-d").arg(&dimg_path).output()?;
    assert!(output.status.success());
    let arr = json::parse(&String::from_utf8(output.stdout)?)?;
    // first entry is cluster 2
    assert_eq!(arr[0]["cluster"],2);
    assert_eq!(arr[0]["status"],"used");
    assert_eq!(arr[0]["value"],"003");
    assert_eq!(arr[1]["status"],"eoc");
    assert_eq!(arr[2]["status"],"free");
    Ok(())
}

#[test]
fn defrag_and_erase() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("erase.img");
    mkdsk(&dimg_path,"720k")?;
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("put").arg("-f").arg("/A.TXT").arg("-d").arg(&dimg_path)
        .write_stdin("some text")
        .assert()
        .success();
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("defrag").arg("-d").arg(&dimg_path)
        .assert()
        .success()
        .stderr(predicate::str::contains("0 moved, 1 already contiguous"));
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("erase").arg("-d").arg(&dimg_path)
        .write_stdin("")
        .assert()
        .success();
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("get").arg("-f").arg("/A.TXT").arg("-d").arg(&dimg_path)
        .assert()
        .failure();
    Ok(())
}

#[test]
fn settings_file() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let settings_path = dir.path().join("settings.json");
    std::fs::write(&settings_path,r#"{"preset":"720k","numericTail":false}"#)?;
    let dimg_path = dir.path().join("default.img");
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("mkdsk").arg("-d").arg(&dimg_path).arg("--settings").arg(&settings_path)
        .assert()
        .success();
    assert_eq!(std::fs::metadata(&dimg_path)?.len(),737280);
    Ok(())
}

#[test]
fn completions() -> STDRESULT {
    let mut cmd = cargo::cargo_bin_cmd!("fat12kit");
    cmd.arg("completions").arg("-s").arg("bash")
        .assert()
        .success()
        .stdout(predicate::str::contains("fat12kit"));
    Ok(())
}

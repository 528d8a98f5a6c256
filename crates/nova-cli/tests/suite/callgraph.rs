use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use nova_test_utils::{write_class_dir, write_jar, ClassFileBuilder};
use predicates::prelude::*;

const PUBLIC: u16 = 0x0001;
const STATIC: u16 = 0x0008;

fn nova() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("nova"))
}

/// `classes/` holds `app/Main`; `util.jar` holds `lib/Util`.
fn fixture() -> TempDir {
    let temp = TempDir::new().unwrap();
    let classes = temp.child("classes");
    classes.create_dir_all().unwrap();
    write_class_dir(
        classes.path(),
        &[(
            "app/Main",
            ClassFileBuilder::new("app/Main")
                .method(PUBLIC | STATIC, "main", "([Ljava/lang/String;)V", |code| {
                    code.invokestatic("app/Main", "run", "()V")
                        .getstatic("java/lang/System", "out", "Ljava/io/PrintStream;")
                        .ldc_string("done")
                        .invokevirtual("java/io/PrintStream", "println", "(Ljava/lang/String;)V");
                })
                .method(PUBLIC | STATIC, "run", "()V", |code| {
                    code.invokestatic("lib/Util", "help", "()V")
                        .invokestatic("app/Main", "run", "()V");
                })
                .build(),
        )],
    )
    .unwrap();
    write_jar(
        &temp.child("util.jar").path().to_path_buf(),
        &[(
            "lib/Util.class",
            ClassFileBuilder::new("lib/Util")
                .method(PUBLIC | STATIC, "help", "()V", |_| {})
                .build(),
        )],
    )
    .unwrap();
    temp
}

fn callgraph(temp: &TempDir) -> Command {
    let mut cmd = nova();
    cmd.current_dir(temp.path())
        .arg("callgraph")
        .arg("--classpath")
        .arg(temp.child("classes").path())
        .arg("--library")
        .arg(temp.child("util.jar").path());
    cmd
}

#[test]
fn help_mentions_callgraph_commands() {
    nova()
        .args(["callgraph", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("callers")
                .and(predicate::str::contains("callees"))
                .and(predicate::str::contains("tree"))
                .and(predicate::str::contains("unresolved"))
                .and(predicate::str::contains("resolve"))
                .and(predicate::str::contains("stats")),
        );
}

#[test]
fn callees_and_callers_list_linked_methods() {
    let temp = fixture();

    callgraph(&temp)
        .args(["callees", "app/Main", "run", "()V"])
        .assert()
        .success()
        .stdout("app/Main.run()V\nlib/Util.help()V\n");

    callgraph(&temp)
        .args(["callers", "lib/Util", "help", "()V", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"owner\": \"app/Main\""));
}

#[test]
fn unknown_method_exits_with_one() {
    let temp = fixture();
    callgraph(&temp)
        .args(["callers", "app/Main", "missing", "()V"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no such method: app/Main.missing()V"));
}

#[test]
fn tree_marks_recursion() {
    let temp = fixture();
    callgraph(&temp)
        .args(["tree", "app/Main", "main", "([Ljava/lang/String;)V", "--depth", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("    app/Main.run()V (recursive)"));
}

#[test]
fn unresolved_lists_jdk_calls() {
    let temp = fixture();
    let output = callgraph(&temp)
        .args(["unresolved", "--json"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let owners = v.as_array().unwrap();
    assert_eq!(owners.len(), 1, "{v:#}");
    assert_eq!(owners[0]["owner"], "java/io/PrintStream");
    assert_eq!(owners[0]["calls"][0]["name"], "println");
    assert_eq!(
        owners[0]["references"][0]["caller"]["name"],
        "main",
        "{v:#}"
    );
}

#[test]
fn resolve_reports_declaring_class_or_failure() {
    let temp = fixture();
    callgraph(&temp)
        .args(["resolve", "static", "lib/Util", "help", "()V"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("lib/Util.help()V"));

    callgraph(&temp)
        .args(["resolve", "virtual", "lib/Util", "help", "()V", "--json"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("no such method"));

    callgraph(&temp)
        .args(["resolve", "static", "java/lang/Math", "abs", "(I)I"])
        .assert()
        .code(1)
        .stdout("unresolved: owner not found\n");
}

#[test]
fn stats_json_counts_the_whole_workspace() {
    let temp = fixture();
    let output = callgraph(&temp).args(["stats", "--json"]).output().unwrap();
    assert!(output.status.success());

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["classes"], 2);
    assert_eq!(v["vertices"], 3);
    assert_eq!(v["edges"], 3);
    assert_eq!(v["unresolved_owners"], 1);
}

#[test]
fn disabled_call_graph_is_an_error() {
    let temp = fixture();
    temp.child("nova.toml")
        .write_str("[call_graph]\nactive = false\n")
        .unwrap();

    callgraph(&temp)
        .arg("stats")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("call graph is disabled"));
}

#[test]
fn missing_library_is_an_error() {
    let temp = fixture();
    nova()
        .current_dir(temp.path())
        .args(["callgraph", "stats", "--library"])
        .arg(temp.child("absent.jar").path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to load library"));
}

#[test]
fn invalid_config_is_rejected() {
    let temp = fixture();
    temp.child("nova.toml")
        .write_str("[call_graph]\nthreads = 100000\n")
        .unwrap();

    callgraph(&temp)
        .arg("stats")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid config"));
}

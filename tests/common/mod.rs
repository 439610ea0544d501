#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;

pub fn run_kitmig(args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_kitmig"));
    command.args(args);
    command.output().expect("failed to run kitmig binary")
}

/// Temp npm project (package.json at the root) holding one fixture file.
pub fn project_with_file(name: &str, content: &str) -> (TempDir, PathBuf) {
    let root = tempfile::tempdir().expect("temp project directory");
    fs::write(root.path().join("package.json"), "{}\n").expect("package.json should be written");

    let file = root.path().join(name);
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent).expect("fixture directories should be created");
    }
    fs::write(&file, content).expect("fixture should be written");

    (root, file)
}

pub fn fork_fixture() -> String {
    concat!(
        "import { allSettled, fork } from \"effector\";\n\n",
        "it(\"increments\", async () => {\n",
        "  const scope = fork();\n",
        "  await allSettled(increment, { scope });\n",
        "  expect(scope.getState($count)).toBe(1);\n",
        "});\n",
    )
    .to_string()
}

pub fn create_watch_fixture() -> String {
    concat!(
        "import { allSettled, createWatch } from \"effector\";\n\n",
        "it(\"notifies\", async () => {\n",
        "  const { scope } = testKit.fork();\n",
        "  const listener = vi.fn();\n",
        "  createWatch({ unit: $count, fn: listener, scope });\n",
        "  await allSettled(increment, { scope });\n",
        "  expect(listener).toHaveBeenCalled();\n",
        "});\n",
    )
    .to_string()
}

pub fn combined_fixture() -> String {
    concat!(
        "import { allSettled, createWatch, fork } from \"effector\";\n\n",
        "it(\"increments\", async () => {\n",
        "  const scope = fork();\n",
        "  const spy = vi.fn();\n",
        "  createWatch({ unit: $count, fn: spy, scope });\n",
        "  await allSettled(increment, { scope });\n",
        "  expect(spy).toHaveBeenCalled();\n",
        "});\n",
    )
    .to_string()
}

pub fn migrated_fixture() -> String {
    concat!(
        "import { createTestKit } from \"&test_utils/test_kit\";\n\n",
        "const testKit = await createTestKit({\n",
        "\timportMetaUrl: import.meta.url\n",
        "});\n\n",
        "it(\"increments\", async () => {\n",
        "  const { scope } = testKit.fork();\n",
        "  await allSettled(increment, { scope });\n",
        "});\n",
    )
    .to_string()
}

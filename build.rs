use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_LOCALE: &str = "en";

fn main() {
    let locales_dir = Path::new("locales");
    println!("cargo:rerun-if-changed={}", locales_dir.display());

    let mut locales = BTreeMap::<String, BTreeMap<String, String>>::new();
    let entries = fs::read_dir(locales_dir).unwrap_or_else(|error| {
        panic!("failed to read {}: {error}", locales_dir.display());
    });
    for entry in entries {
        let path = entry
            .unwrap_or_else(|error| panic!("failed to list locale file: {error}"))
            .path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
            continue;
        }
        println!("cargo:rerun-if-changed={}", path.display());

        let Some(tag) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let source = fs::read_to_string(&path)
            .unwrap_or_else(|error| panic!("failed to read {}: {error}", path.display()));
        let table = source
            .parse::<toml::Table>()
            .unwrap_or_else(|error| panic!("invalid locale file {}: {error}", path.display()));

        let mut messages = BTreeMap::new();
        flatten("", &table, &mut messages, &path);
        locales.insert(tag.to_string(), messages);
    }

    let mut generated = String::new();
    generated.push_str(&format!(
        "pub(super) const DEFAULT_LOCALE: &str = {DEFAULT_LOCALE:?};\n"
    ));
    generated.push_str("pub(super) const LOCALES: &[(&str, &[(&str, &str)])] = &[\n");
    for (tag, messages) in &locales {
        generated.push_str(&format!("    ({tag:?}, &[\n"));
        for (key, message) in messages {
            generated.push_str(&format!("        ({key:?}, {message:?}),\n"));
        }
        generated.push_str("    ]),\n");
    }
    generated.push_str("];\n");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap_or_else(|error| {
        panic!("OUT_DIR is not set: {error}");
    }));
    fs::write(out_dir.join("dojoform_i18n_generated.rs"), generated)
        .unwrap_or_else(|error| panic!("failed to write generated catalog: {error}"));
}

fn flatten(prefix: &str, table: &toml::Table, out: &mut BTreeMap<String, String>, path: &Path) {
    for (name, value) in table {
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        match value {
            toml::Value::String(message) => {
                out.insert(key, message.clone());
            }
            toml::Value::Table(nested) => flatten(&key, nested, out, path),
            other => panic!(
                "locale file {} has non-string message `{key}`: {other}",
                path.display()
            ),
        }
    }
}

use std::fs;
use std::path::Path;

// The /uptime reply reports the meshtastic library version alongside the bot
// and firmware versions. Cargo does not expose dependency versions to the
// compiled crate, so read our own manifest and pass the requirement through.
fn main() {
    println!("cargo:rerun-if-changed=Cargo.toml");

    let manifest = Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
    let version = fs::read_to_string(manifest)
        .ok()
        .and_then(|raw| raw.parse::<toml::Table>().ok())
        .and_then(|doc| {
            doc.get("dependencies")?
                .get("meshtastic")
                .map(|dep| match dep {
                    toml::Value::String(v) => v.clone(),
                    toml::Value::Table(t) => t
                        .get("version")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown")
                        .to_string(),
                    _ => "unknown".to_string(),
                })
        })
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=MESHTASTIC_LIB_VERSION={version}");
}

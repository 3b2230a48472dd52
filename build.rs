use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use syntect::dumps::dump_to_uncompressed_file;
use syntect::highlighting::ThemeSet;
use syntect::html::{ClassStyle, css_for_theme_with_class_style};
use two_face::syntax;

const LIGHT_THEME: &str = "base16-ocean.light";
const DARK_THEME: &str = "base16-ocean.dark";

fn main() {
    prepare_highlighting_assets().expect("failed to prepare syntax highlighting assets");
    println!("cargo:rerun-if-changed=build.rs");
}

fn prepare_highlighting_assets() -> Result<(), String> {
    let out_dir = PathBuf::from(env::var("OUT_DIR").map_err(|err| err.to_string())?);

    write_syntax_pack(&out_dir)?;
    write_theme_css(&out_dir, LIGHT_THEME, "THEME_CSS_LIGHT_FILE", "theme-light.css")?;
    write_theme_css(&out_dir, DARK_THEME, "THEME_CSS_DARK_FILE", "theme-dark.css")
}

fn write_theme_css(
    out_dir: &Path,
    theme_name: &str,
    env_key: &str,
    file_name: &str,
) -> Result<(), String> {
    let theme_set = ThemeSet::load_defaults();
    let theme = theme_set
        .themes
        .get(theme_name)
        .ok_or_else(|| format!("theme `{theme_name}` not found"))?;

    let css = css_for_theme_with_class_style(theme, ClassStyle::SpacedPrefixed { prefix: "syntax-" })
        .map_err(|err| err.to_string())?;

    let mut combined = String::with_capacity(css.len() + 80);
    combined.push_str(&format!(
        "/* --- Syntect theme ({theme_name}), generated at build time --- */\n"
    ));
    combined.push_str(&css);
    combined.push('\n');

    let path = out_dir.join(file_name);
    fs::write(&path, combined)
        .map_err(|err| format!("failed to write {}: {err}", path.display()))?;

    println!("cargo:rustc-env={env_key}={}", path.display());
    Ok(())
}

fn write_syntax_pack(out_dir: &Path) -> Result<(), String> {
    let syntax_set = syntax::extra_newlines();
    let pack_path = out_dir.join("syntaxes.packdump");
    dump_to_uncompressed_file(&syntax_set, &pack_path)
        .map_err(|err| format!("failed to encode syntax set: {err}"))?;

    println!("cargo:rustc-env=SYNTAX_PACK_FILE={}", pack_path.display());

    Ok(())
}

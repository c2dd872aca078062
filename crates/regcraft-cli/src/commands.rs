//! Subcommand implementations

use anyhow::{Context, Result, bail};
use regcraft::{
    bitmap::BitSourceMap,
    bits::Width,
    descriptor::RegisterMap,
    image::Image,
    layout::{LayoutEncoder, MissingRegisterPolicy, decode},
    store::{ConfigOptions, DuplicatePolicy, Radix, RegisterStore},
    transform::TranslationRegistry,
};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::cli::{ConfigArgs, WidthArgs};

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn emit(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => fs::write(path, text).with_context(|| format!("writing {}", path.display())),
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

fn width(bits: u32, what: &str) -> Result<Width> {
    Width::new(bits).with_context(|| format!("invalid {what} width"))
}

fn load_descriptor(path: &Path, register_width: Width) -> Result<RegisterMap> {
    let map = RegisterMap::from_json(&read(path)?, register_width, &TranslationRegistry::new())
        .with_context(|| format!("loading descriptor {}", path.display()))?;
    log::info!(
        "loaded {} registers, {} fields",
        map.registers().count(),
        map.fields().count()
    );
    Ok(map)
}

fn load_bitmap(path: &Path, word_width: Width) -> Result<BitSourceMap> {
    let text = read(path)?;
    let map = if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json")) {
        BitSourceMap::from_json(&text)
    } else {
        BitSourceMap::parse(&text, word_width)
    }
    .with_context(|| format!("loading bit map {}", path.display()))?;

    log::info!("loaded bit map with {} words of {}", map.len(), map.width());
    Ok(map)
}

fn load_config(path: &Path, register_width: Width, args: ConfigArgs) -> Result<RegisterStore> {
    let options = ConfigOptions {
        duplicates: if args.reject_duplicates {
            DuplicatePolicy::Reject
        } else {
            DuplicatePolicy::LastWins
        },
        default_radix: if args.decimal_values { Radix::Decimal } else { Radix::Hex },
    };

    RegisterStore::parse(&read(path)?, register_width, options)
        .with_context(|| format!("loading configuration {}", path.display()))
}

fn load_image(path: &Path, word_width: Width) -> Result<Image> {
    Image::parse(&read(path)?, word_width).with_context(|| format!("loading image {}", path.display()))
}

/// Builds the image text for a register configuration.
pub fn encode_image(
    descriptor: &Path,
    bitmap: &Path,
    config: &Path,
    strict_missing: bool,
    widths: WidthArgs,
    config_args: ConfigArgs,
) -> Result<String> {
    let register_width = width(widths.register_width, "register")?;
    let descriptor = load_descriptor(descriptor, register_width)?;
    let bitmap = load_bitmap(bitmap, width(widths.word_width, "word")?)?;
    let registers = load_config(config, register_width, config_args)?;

    let policy = if strict_missing {
        MissingRegisterPolicy::Reject
    } else {
        MissingRegisterPolicy::Zero
    };
    let encoded = LayoutEncoder::new(&descriptor, &bitmap)
        .missing_registers(policy)
        .encode(&registers)
        .context("encoding image")?;

    if !encoded.warnings.is_empty() {
        log::warn!(
            "{} image bits come from registers that are not writable",
            encoded.warnings.len()
        );
    }

    Ok(encoded.image.to_string())
}

/// Run the encode command
pub fn run_encode(
    descriptor: &Path,
    bitmap: &Path,
    config: &Path,
    output: Option<&Path>,
    strict_missing: bool,
    widths: WidthArgs,
    config_args: ConfigArgs,
) -> Result<()> {
    let text = encode_image(descriptor, bitmap, config, strict_missing, widths, config_args)?;
    emit(output, &text)
}

/// Recovers `R<n> <value>` lines from an image readback.
pub fn decode_image(bitmap: &Path, image: &Path, strict: bool, widths: WidthArgs) -> Result<String> {
    let bitmap = load_bitmap(bitmap, width(widths.word_width, "word")?)?;
    let image = load_image(image, bitmap.width())?;

    let decoded = decode(&image, &bitmap, width(widths.register_width, "register")?)
        .context("decoding image")?;

    for mismatch in &decoded.mismatches {
        log::warn!("{mismatch}");
    }
    if strict && !decoded.mismatches.is_empty() {
        bail!("{} fixed bits read back wrong", decoded.mismatches.len());
    }

    let digits = decoded.deltas.width().bits().div_ceil(4) as usize;
    let mut text = String::new();
    for (register, value) in decoded.deltas.iter() {
        writeln!(text, "R{register} {value:#0w$x}", w = digits + 2)?;
    }

    Ok(text)
}

/// Run the decode command
pub fn run_decode(
    bitmap: &Path,
    image: &Path,
    output: Option<&Path>,
    strict: bool,
    widths: WidthArgs,
) -> Result<()> {
    let text = decode_image(bitmap, image, strict, widths)?;
    emit(output, &text)
}

/// `<field> = <value>` lines for every field of a register configuration.
pub fn field_report(
    descriptor: &Path,
    config: &Path,
    widths: WidthArgs,
    config_args: ConfigArgs,
) -> Result<String> {
    let register_width = width(widths.register_width, "register")?;
    let descriptor = load_descriptor(descriptor, register_width)?;
    let registers = load_config(config, register_width, config_args)?;

    let (_, skipped) = descriptor.registers_for_write(&registers);
    if !skipped.is_empty() {
        log::warn!("{} configured registers are not writable", skipped.len());
    }

    let mut text = String::new();
    for (name, value) in descriptor.decode_fields(&registers).context("reading fields")? {
        writeln!(text, "{name} = {value}")?;
    }

    Ok(text)
}

/// Run the fields command
pub fn run_fields(descriptor: &Path, config: &Path, widths: WidthArgs, config_args: ConfigArgs) -> Result<()> {
    print!("{}", field_report(descriptor, config, widths, config_args)?);
    Ok(())
}

/// Word-by-word comparison of two image files: the report and the number of differing words.
pub fn diff_images(expected: &Path, actual: &Path, widths: WidthArgs) -> Result<(String, usize)> {
    let word_width = width(widths.word_width, "word")?;
    let expected = load_image(expected, word_width)?;
    let actual = load_image(actual, word_width)?;

    let diffs = expected.diff(&actual);
    let show = |word: Option<u64>| word.map_or_else(|| "-".to_string(), |w| format!("{w:#x}"));

    let mut text = String::new();
    for diff in &diffs {
        writeln!(
            text,
            "{:#04x}\texpected: {}\tactual: {}",
            diff.address,
            show(diff.expected),
            show(diff.actual)
        )?;
    }
    if diffs.is_empty() {
        writeln!(text, "Images match ({} words)", expected.len())?;
    }

    Ok((text, diffs.len()))
}

/// Run the diff command
pub fn run_diff(expected: &Path, actual: &Path, widths: WidthArgs) -> Result<()> {
    let (text, differing) = diff_images(expected, actual, widths)?;
    print!("{text}");

    if differing > 0 {
        bail!("images differ in {differing} words");
    }

    Ok(())
}

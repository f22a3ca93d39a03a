//! xlpack CLI - inspect and edit XLSX packages
//!
//! Edits load only the sheets they touch; every other sheet is written back unchanged.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use xlpack::model::Formula;
use xlpack::{CellRef, CellValue, Workbook};

/// Inspect and edit XLSX workbooks without rewriting untouched sheets
#[derive(Parser)]
#[command(
    name = "xlpack",
    version,
    about = "Inspect and edit XLSX workbooks",
    long_about = "xlpack - lazy-loading XLSX package tool.\n\n\
                  Sheets are parsed only when a command needs them; all other sheets are \
                  copied byte for byte on save."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the sheet directory and table sizes
    Info {
        /// Input file path
        input: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the stored cells of a sheet
    Cells {
        /// Input file path
        input: PathBuf,

        /// Sheet name
        sheet: String,
    },

    /// Print the value of one cell
    Get {
        /// Input file path
        input: PathBuf,

        /// Sheet name
        sheet: String,

        /// Cell reference, e.g. B7
        reference: String,
    },

    /// Set the value of one cell
    Set {
        /// Input file path
        input: PathBuf,

        /// Sheet name
        sheet: String,

        /// Cell reference, e.g. B7
        reference: String,

        /// Value: a number, true/false, =FORMULA, or text
        value: String,

        /// Output file path (default: overwrite the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Append an empty worksheet
    AddSheet {
        /// Input file path
        input: PathBuf,

        /// New sheet name
        name: String,

        /// Output file path (default: overwrite the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove a sheet
    RemoveSheet {
        /// Input file path
        input: PathBuf,

        /// Sheet name
        name: String,

        /// Output file path (default: overwrite the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rename a sheet
    RenameSheet {
        /// Input file path
        input: PathBuf,

        /// Current sheet name
        old: String,

        /// New sheet name
        new: String,

        /// Output file path (default: overwrite the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the workbook to a new file without loading any sheet
    Resave {
        /// Input file path
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Info { input, json } => {
            let workbook = Workbook::open(&input)?;
            let summary = workbook.summary();

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }

            println!("{}", "Workbook Information".cyan().bold());
            println!("{}", "─".repeat(40));
            println!(
                "{}: {}",
                "File".bold(),
                input.file_name().unwrap_or_default().to_string_lossy()
            );
            println!("{}: {}", "Format".bold(), summary.format);
            println!("{}: {:?}", "Date system".bold(), summary.date_system);
            println!("{}: {}", "Parts".bold(), summary.part_count);
            println!("{}: {}", "Cell formats".bold(), summary.style_count);
            println!("{}: {}", "Shared strings".bold(), summary.shared_string_count);

            println!("\n{}", "Sheets".cyan().bold());
            println!("{}", "─".repeat(40));
            for sheet in &summary.sheets {
                let mut line = format!("{:>3}  {}  {}", sheet.sheet_id, sheet.name.bold(), sheet.part.dimmed());
                if sheet.hidden {
                    line.push_str(&format!("  {}", "(hidden)".yellow()));
                }
                println!("{line}");
            }
        }

        Commands::Cells { input, sheet } => {
            let mut workbook = Workbook::open(&input)?;
            let sheet = workbook.sheet(&sheet)?;
            for (reference, cell) in sheet.cells() {
                if cell.value.is_empty() {
                    continue;
                }
                println!("{}\t{}", reference.to_string().bold(), cell.value);
            }
        }

        Commands::Get {
            input,
            sheet,
            reference,
        } => {
            let mut workbook = Workbook::open(&input)?;
            let sheet = workbook.sheet(&sheet)?;
            let cell = CellRef::parse(&reference)?;
            match sheet.date(cell.row, cell.col) {
                Some(date) => println!("{date}"),
                None => println!("{}", sheet.value(cell.row, cell.col)),
            }
        }

        Commands::Set {
            input,
            sheet,
            reference,
            value,
            output,
        } => {
            let mut workbook = Workbook::open(&input)?;
            workbook
                .sheet(&sheet)?
                .set_value_at(&reference, parse_value(&value))?;
            save(&workbook, output.as_deref())?;
            println!("{} Set {}!{}", "✓".green().bold(), sheet, reference);
        }

        Commands::AddSheet {
            input,
            name,
            output,
        } => {
            let mut workbook = Workbook::open(&input)?;
            workbook.add_worksheet(&name)?;
            save(&workbook, output.as_deref())?;
            println!("{} Added sheet {}", "✓".green().bold(), name);
        }

        Commands::RemoveSheet {
            input,
            name,
            output,
        } => {
            let mut workbook = Workbook::open(&input)?;
            workbook.remove_worksheet(&name)?;
            save(&workbook, output.as_deref())?;
            println!("{} Removed sheet {}", "✓".green().bold(), name);
        }

        Commands::RenameSheet {
            input,
            old,
            new,
            output,
        } => {
            let mut workbook = Workbook::open(&input)?;
            workbook.rename_worksheet(&old, &new)?;
            save(&workbook, output.as_deref())?;
            println!("{} Renamed {} to {}", "✓".green().bold(), old, new);
        }

        Commands::Resave { input, output } => {
            xlpack::resave(&input, &output)?;
            println!("{} Wrote {}", "✓".green().bold(), output.display());
        }
    }

    Ok(())
}

fn save(workbook: &Workbook, output: Option<&Path>) -> xlpack::Result<()> {
    match output {
        Some(path) => workbook.save_as(path),
        None => workbook.save(),
    }
}

/// Interpret command-line text as a cell value.
fn parse_value(text: &str) -> CellValue {
    if let Some(expression) = text.strip_prefix('=') {
        return Formula::new(expression).into();
    }
    match text {
        "true" | "TRUE" => return CellValue::Boolean(true),
        "false" | "FALSE" => return CellValue::Boolean(false),
        _ => {}
    }
    match text.parse::<f64>() {
        Ok(number) if number.is_finite() => CellValue::Number(number),
        _ => CellValue::Text(text.to_string()),
    }
}

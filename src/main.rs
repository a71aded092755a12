use clap::{ArgGroup, Parser};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::mpsc;
use std::thread;

use metaclean::batch::collect_folder_files;
use metaclean::{
    BatchCleaningResult, BatchEvent, BatchOrchestrator, CleanOptions, CleaningLevel,
    CleaningResult, EngineConfig, MetadataCleaner, save_report,
};

const HEADER_WIDTH: usize = 66;

#[derive(Debug, Parser)]
#[command(
    name = "metaclean",
    version,
    about = "Elimina metadata identificable de documentos, imágenes y multimedia"
)]
#[command(group(ArgGroup::new("entrada").required(true).args(["file", "files", "folder"])))]
struct Cli {
    /// Archivo a limpiar.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Varios archivos, limpiados como un lote.
    #[arg(long, num_args = 1..)]
    files: Vec<PathBuf>,

    /// Carpeta a limpiar como un lote.
    #[arg(long)]
    folder: Option<PathBuf>,

    /// Recorre también las subcarpetas.
    #[arg(short, long, requires = "folder")]
    recursive: bool,

    /// Ruta de salida para `--file`; por defecto se limpia en el sitio.
    #[arg(short, long, requires = "file")]
    output: Option<PathBuf>,

    /// Muestra la metadata de `--file` sin modificarlo.
    #[arg(long, requires = "file")]
    extract: bool,

    /// basic, deep o paranoid.
    #[arg(short, long)]
    level: Option<CleaningLevel>,

    #[arg(long, conflicts_with = "no_backup")]
    backup: bool,

    #[arg(long)]
    no_backup: bool,

    #[arg(long)]
    backup_dir: Option<PathBuf>,

    #[arg(long)]
    no_verify: bool,

    /// Trabajadores simultáneos en un lote.
    #[arg(short, long)]
    workers: Option<usize>,

    /// Guarda el reporte JSON en esta ruta.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Configuración TOML del motor.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Cli {
    fn engine_config(&self) -> metaclean::Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_toml_file(path)?,
            None => EngineConfig::default(),
        };
        if let Some(level) = self.level {
            config.level = level;
        }
        if self.backup {
            config.backup = true;
        }
        if self.no_backup {
            config.backup = false;
        }
        if let Some(dir) = &self.backup_dir {
            config.backup_dir = Some(dir.clone());
        }
        if self.no_verify {
            config.verify = false;
        }
        if let Some(workers) = self.workers {
            config.max_workers = workers;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_logging(level: &str) {
    let level = tracing::Level::from_str(level).unwrap_or(tracing::Level::WARN);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);
    render_header();

    let engine = match cli.engine_config().and_then(MetadataCleaner::new) {
        Ok(engine) => engine,
        Err(error) => {
            eprintln!("{}", style(error.report_line()).red().bold());
            return ExitCode::from(2);
        }
    };
    let options = engine.default_options();

    if let Some(path) = &cli.file {
        if cli.extract {
            return show_metadata(&engine, path);
        }
        let result = engine.clean_file(path, cli.output.as_deref(), &options);
        render_result(&result);
        if let Some(report) = &cli.report
            && let Err(error) = save_report(&result.to_report(), report)
        {
            eprintln!("{}", style(error.report_line()).red());
        }
        return if result.success {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    let paths = match &cli.folder {
        Some(folder) => match collect_folder_files(folder, cli.recursive, engine.config().follow_symlinks) {
            Ok(paths) => paths,
            Err(error) => {
                eprintln!("{}", style(error.report_line()).red().bold());
                return ExitCode::FAILURE;
            }
        },
        None => cli.files.clone(),
    };

    let batch = run_batch(&engine, paths, &options);
    render_batch_summary(&batch);
    if let Some(report) = &cli.report
        && let Err(error) = save_report(&batch.to_report(), report)
    {
        eprintln!("{}", style(error.report_line()).red());
    }

    if batch.failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn run_batch(
    engine: &MetadataCleaner,
    paths: Vec<PathBuf>,
    options: &CleanOptions,
) -> BatchCleaningResult {
    let (tx, rx) = mpsc::channel();
    let progress = ProgressBar::new(paths.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    thread::scope(|scope| {
        let bar = progress.clone();
        scope.spawn(move || {
            for event in rx {
                match event {
                    BatchEvent::Started { total } => bar.set_length(total as u64),
                    BatchEvent::Processing { path, .. } => {
                        bar.set_message(path.display().to_string());
                    }
                    BatchEvent::Success { .. } | BatchEvent::Failure { .. } => bar.inc(1),
                    BatchEvent::Skipped { .. } => bar.inc(1),
                    BatchEvent::Finished { .. } => bar.finish_and_clear(),
                }
            }
        });

        let orchestrator =
            BatchOrchestrator::new(engine, engine.config().max_workers).with_events(tx);
        orchestrator.run(paths, options)
    })
}

fn render_header() {
    let border = "─".repeat(HEADER_WIDTH - 2);
    println!("\n{}", style(format!("┌{}┐", border)).cyan());
    println!(
        "{}",
        style(format!(
            "│ {:^inner_width$} │",
            "▸ metaclean · Limpieza de metadata ◂",
            inner_width = HEADER_WIDTH - 4
        ))
        .cyan()
        .bold()
    );
    println!("{}\n", style(format!("└{}┘", border)).cyan());
}

fn show_metadata(engine: &MetadataCleaner, path: &std::path::Path) -> ExitCode {
    match engine.extract_metadata(path) {
        Ok(fields) if fields.is_empty() => {
            println!("{}", style("│ No se encontró metadata.").dim());
            ExitCode::SUCCESS
        }
        Ok(fields) => {
            println!("{}", style(format!("┌─ Metadata de {} ─", path.display())).cyan());
            for (field, value) in &fields {
                println!("│ {}: {}", style(field).cyan().bold(), value);
            }
            println!("{}", style("└─").cyan());
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("{}", style(error.report_line()).red().bold());
            ExitCode::FAILURE
        }
    }
}

fn render_result(result: &CleaningResult) {
    if result.success {
        println!("{}", style("┌─ Metadata Eliminada Exitosamente ─").green());
        println!(
            "{}",
            style(format!("│ Archivo: {}", result.file_path.display()))
                .green()
                .bold()
        );
        println!("│ Campos eliminados: {}", result.metadata_count());
        for (field, value) in &result.metadata_removed {
            println!("│   {} {}", style(field).dim(), value);
        }
        println!(
            "│ Tamaño: {} → {} bytes ({:.2}%)",
            result.original_size,
            result.cleaned_size,
            result.size_reduction_percent()
        );
        if let Some(backup) = &result.backup_path {
            println!("│ Copia de seguridad: {}", backup.display());
        }
        for warning in &result.warnings {
            println!("{}", style(format!("│ ⚠ {warning}")).yellow());
        }
        println!("{}", style("└─").green());
    } else {
        println!("{}", style("┌─ No se pudo limpiar el archivo ─").red());
        println!("│ Archivo: {}", result.file_path.display());
        for error in &result.errors {
            println!("{}", style(format!("│ {error}")).red());
        }
        println!("{}", style("└─").red());
    }
}

fn render_batch_summary(batch: &BatchCleaningResult) {
    println!("\n{}", style("┌─ Resumen del lote ─").cyan());
    println!("│ Archivos: {}", batch.total_files);
    println!("│ {}", style(format!("Limpios: {}", batch.successful)).green());
    println!("│ {}", style(format!("Fallidos: {}", batch.failed)).red());
    println!("│ {}", style(format!("Omitidos: {}", batch.skipped)).yellow());
    println!("│ Tasa de éxito: {:.2}%", batch.success_rate());
    println!("│ Reducción total: {} bytes", batch.total_size_reduction);
    println!("│ Tiempo: {:.3} s", batch.total_time.as_secs_f64());

    let failures: Vec<&CleaningResult> = batch.results.iter().filter(|r| !r.success).collect();
    if !failures.is_empty() {
        println!("│");
        for result in failures {
            println!(
                "│ {} {}",
                style("✗").red(),
                style(result.file_path.display()).dim()
            );
            for error in &result.errors {
                println!("│   {}", style(error).red());
            }
        }
    }
    println!("{}", style("└─").cyan());
}

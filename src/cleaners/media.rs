//! Audio y video a través de `ffmpeg`/`ffprobe` como procesos externos, con
//! límite de tiempo por invocación.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::classify::Category;
use crate::cleaners::{CleanReport, Cleaner, MetadataMap, insert_unique};
use crate::config::EngineConfig;
use crate::error::{CleanError, Result};
use crate::policy::{CleaningLevel, CleaningPolicy, MetadataDomain, field_domain};
use crate::scratch::write_atomically;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Ejecuta `command` y lo mata si supera `timeout`.
pub fn run_with_timeout(command: &mut Command, timeout: Duration) -> Result<Output> {
    let program = command.get_program().to_string_lossy().to_string();
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| CleanError::cleaner("media", format!("no se pudo ejecutar {program}: {e}")))?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                tracing::warn!("{program} superó {} s y fue detenido", timeout.as_secs());
                return Err(CleanError::Timeout {
                    program,
                    secs: timeout.as_secs(),
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                return Err(CleanError::cleaner(
                    "media",
                    format!("error esperando a {program}: {e}"),
                ));
            }
        }
    };

    let collect = |handle: Option<thread::JoinHandle<Vec<u8>>>| {
        handle
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    };
    Ok(Output {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = pipe.read_to_end(&mut buffer);
        buffer
    })
}

fn is_available(program: &Path) -> bool {
    Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

/// Rutas a ffmpeg y ffprobe ya comprobadas.
#[derive(Clone, Debug)]
pub struct FfmpegTool {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    timeout: Duration,
}

impl FfmpegTool {
    pub fn new(ffmpeg: PathBuf, ffprobe: PathBuf, timeout: Duration) -> Self {
        Self {
            ffmpeg,
            ffprobe,
            timeout,
        }
    }

    /// Busca las herramientas configuradas. Si faltan devuelve `None`, salvo que la
    /// configuración las exija.
    pub fn locate(config: &EngineConfig) -> Result<Option<Self>> {
        let missing: Vec<&Path> = [&config.ffmpeg_path, &config.ffprobe_path]
            .into_iter()
            .map(PathBuf::as_path)
            .filter(|program| !is_available(program))
            .collect();

        if missing.is_empty() {
            return Ok(Some(Self::new(
                config.ffmpeg_path.clone(),
                config.ffprobe_path.clone(),
                Duration::from_secs(config.external_timeout_secs),
            )));
        }

        let names = missing
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        if config.require_media_tools {
            return Err(CleanError::Config(format!(
                "herramientas multimedia no disponibles: {names}"
            )));
        }
        tracing::warn!("sin soporte de audio/video, no se encontró: {names}");
        Ok(None)
    }

    pub fn probe(&self, path: &Path) -> Result<MetadataMap> {
        let output = run_with_timeout(
            Command::new(&self.ffprobe)
                .args([
                    "-v",
                    "quiet",
                    "-print_format",
                    "json",
                    "-show_format",
                    "-show_streams",
                    "-show_chapters",
                ])
                .arg(path),
            self.timeout,
        )?;
        if !output.status.success() {
            return Err(CleanError::unreadable(path, "ffprobe no reconoce el archivo"));
        }
        parse_probe_json(&output.stdout)
            .map_err(|e| CleanError::unreadable(path, format!("salida de ffprobe inválida: {e}")))
    }

    pub fn transcode(&self, args: Vec<OsString>) -> Result<()> {
        let output = run_with_timeout(Command::new(&self.ffmpeg).args(args), self.timeout)?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let last_line = stderr.lines().last().unwrap_or("sin detalle");
        Err(CleanError::cleaner("media", format!("ffmpeg falló: {last_line}")))
    }
}

fn tag_entries(value: &Value) -> impl Iterator<Item = (&String, String)> {
    value
        .get("tags")
        .and_then(Value::as_object)
        .into_iter()
        .flatten()
        .map(|(key, value)| {
            let text = match value {
                Value::String(text) => text.trim().to_string(),
                other => other.to_string(),
            };
            (key, text)
        })
}

/// Etiquetas de `ffprobe -print_format json` como `Format.<clave>`,
/// `Stream<n>.<clave>` y `Chapter<n>.<clave>`.
pub fn parse_probe_json(bytes: &[u8]) -> serde_json::Result<MetadataMap> {
    let root: Value = serde_json::from_slice(bytes)?;
    let mut fields = MetadataMap::new();

    if let Some(format) = root.get("format") {
        for (key, text) in tag_entries(format) {
            if !text.is_empty() {
                insert_unique(&mut fields, format!("Format.{key}"), text);
            }
        }
    }
    for (section, label) in [("streams", "Stream"), ("chapters", "Chapter")] {
        let entries = root.get(section).and_then(Value::as_array);
        for (index, entry) in entries.into_iter().flatten().enumerate() {
            for (key, text) in tag_entries(entry) {
                if !text.is_empty() {
                    insert_unique(&mut fields, format!("{label}{index}.{key}"), text);
                }
            }
        }
    }
    Ok(fields)
}

/// Dominio de un campo con el formato de `parse_probe_json`.
fn probe_field_domain(field: &str) -> MetadataDomain {
    if field.starts_with("Chapter") {
        return MetadataDomain::StructuralExtras;
    }
    field_domain(field)
}

/// `-metadata` para el flujo o contenedor al que pertenece `field`.
fn blank_metadata_args(field: &str) -> Option<[OsString; 2]> {
    let (scope, key) = field.split_once('.')?;
    let key = key.split('#').next().unwrap_or(key);
    let option = match scope {
        "Format" => "-metadata".to_string(),
        stream if stream.starts_with("Stream") => {
            format!("-metadata:s:{}", stream.trim_start_matches("Stream"))
        }
        _ => return None,
    };
    Some([option.into(), format!("{key}=").into()])
}

/// Argumentos de ffmpeg para limpiar `input` en `output` con la política de `domains`.
pub fn ffmpeg_args(
    input: &Path,
    output: &Path,
    level: CleaningLevel,
    removed: &MetadataMap,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into(), "-v".into(), "error".into(), "-i".into()];
    args.push(input.into());
    args.extend(["-map", "0", "-c", "copy"].map(OsString::from));

    if CleaningPolicy::drops_metadata_parts(level) {
        args.extend(["-map_metadata", "-1", "-fflags", "+bitexact"].map(OsString::from));
        args.extend(["-flags:v", "+bitexact", "-flags:a", "+bitexact"].map(OsString::from));
    } else {
        args.extend(["-map_metadata", "0"].map(OsString::from));
        for field in removed.keys() {
            args.extend(blank_metadata_args(field).into_iter().flatten());
        }
    }
    if CleaningPolicy::rebuilds_container(level) {
        args.extend(["-map_chapters", "-1"].map(OsString::from));
    }
    args.push(output.into());
    args
}

/// Campos de `before` que faltan, o tienen otro valor, en `after`.
pub fn removed_between(before: &MetadataMap, after: &MetadataMap) -> MetadataMap {
    before
        .iter()
        .filter(|(field, value)| after.get(*field) != Some(*value))
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect()
}

#[derive(Clone, Debug)]
pub struct MediaCleaner {
    tool: FfmpegTool,
    category: Category,
}

impl MediaCleaner {
    pub fn new(tool: FfmpegTool, category: Category) -> Self {
        Self { tool, category }
    }

    /// Campos de `fields` que la política de `level` elimina.
    pub fn removable_fields(&self, fields: &MetadataMap, level: CleaningLevel) -> MetadataMap {
        let domains = CleaningPolicy::domains(self.category, level);
        fields
            .iter()
            .filter(|(field, _)| domains.has(probe_field_domain(field)))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }
}

impl Cleaner for MediaCleaner {
    fn name(&self) -> &str {
        "media"
    }

    fn extract_metadata(&self, path: &Path) -> MetadataMap {
        self.tool.probe(path).unwrap_or_else(|error| {
            tracing::debug!("{error}");
            MetadataMap::new()
        })
    }

    fn clean(&self, input: &Path, output: &Path, level: CleaningLevel) -> Result<CleanReport> {
        let fields = self.tool.probe(input)?;
        let targeted = self.removable_fields(&fields, level);

        let remaining = write_atomically(output, |staged| {
            self.tool.transcode(ffmpeg_args(input, staged, level, &targeted))?;
            self.tool.probe(staged)
        })?;

        let mut report = CleanReport {
            metadata_removed: removed_between(&fields, &remaining),
            warnings: Vec::new(),
        };
        let survivors: Vec<&str> = targeted
            .keys()
            .filter(|field| !report.metadata_removed.contains_key(*field))
            .map(String::as_str)
            .collect();
        if !survivors.is_empty() {
            report.warn(format!(
                "ffmpeg conservó {} campos: {}",
                survivors.len(),
                survivors.join(", ")
            ));
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_OUTPUT: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "audio", "tags": {"language": "spa", "handler_name": "SoundHandler"}}
        ],
        "chapters": [
            {"id": 0, "tags": {"title": "Introducción"}}
        ],
        "format": {
            "filename": "entrevista.m4a",
            "tags": {"artist": "Ana Pérez", "title": "Entrevista", "creation_time": "2024-01-02T10:00:00.000000Z", "encoder": "Lavf60.3.100"}
        }
    }"#;

    fn media_cleaner(category: Category) -> MediaCleaner {
        MediaCleaner::new(
            FfmpegTool::new("ffmpeg".into(), "ffprobe".into(), Duration::from_secs(5)),
            category,
        )
    }

    fn as_strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().to_string()).collect()
    }

    #[test]
    fn probe_json_is_flattened() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let fields = parse_probe_json(PROBE_OUTPUT.as_bytes())?;
        assert_eq!(fields.get("Format.artist").map(String::as_str), Some("Ana Pérez"));
        assert_eq!(fields.get("Stream0.language").map(String::as_str), Some("spa"));
        assert_eq!(
            fields.get("Chapter0.title").map(String::as_str),
            Some("Introducción")
        );
        assert_eq!(fields.len(), 7);
        Ok(())
    }

    #[test]
    fn chapters_survive_until_paranoid() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let fields = parse_probe_json(PROBE_OUTPUT.as_bytes())?;
        let cleaner = media_cleaner(Category::Audio);

        let basic = cleaner.removable_fields(&fields, CleaningLevel::Basic);
        assert_eq!(
            basic.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["Format.artist", "Format.creation_time"]
        );
        let deep = cleaner.removable_fields(&fields, CleaningLevel::Deep);
        assert!(!deep.contains_key("Chapter0.title"));
        assert_eq!(deep.len(), 6);
        let paranoid = cleaner.removable_fields(&fields, CleaningLevel::Paranoid);
        assert_eq!(paranoid.len(), 7);
        Ok(())
    }

    #[test]
    fn basic_arguments_blank_selected_tags() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let fields = parse_probe_json(PROBE_OUTPUT.as_bytes())?;
        let removed = media_cleaner(Category::Audio).removable_fields(&fields, CleaningLevel::Basic);

        let args = as_strings(&ffmpeg_args(
            Path::new("in.m4a"),
            Path::new("out.m4a"),
            CleaningLevel::Basic,
            &removed,
        ));

        assert!(args.windows(2).any(|w| w == ["-map_metadata", "0"]));
        assert!(args.windows(2).any(|w| w == ["-metadata", "artist="]));
        assert!(args.windows(2).any(|w| w == ["-metadata", "creation_time="]));
        assert!(!args.iter().any(|a| a == "-map_chapters"));
        assert_eq!(args.last().map(String::as_str), Some("out.m4a"));
        Ok(())
    }

    #[test]
    fn only_fields_gone_from_the_output_are_reported()
    -> std::result::Result<(), Box<dyn std::error::Error>> {
        let before = parse_probe_json(PROBE_OUTPUT.as_bytes())?;
        let after = parse_probe_json(
            br#"{
                "streams": [
                    {"index": 0, "tags": {"language": "spa", "handler_name": "SoundHandler"}}
                ],
                "format": {"tags": {"encoder": "Lavf61.1.100"}}
            }"#,
        )?;

        let removed = removed_between(&before, &after);
        assert_eq!(
            removed.keys().map(String::as_str).collect::<Vec<_>>(),
            vec![
                "Chapter0.title",
                "Format.artist",
                "Format.creation_time",
                "Format.encoder",
                "Format.title"
            ]
        );
        assert!(removed_between(&after, &after).is_empty());
        Ok(())
    }

    #[test]
    fn deep_and_paranoid_arguments() {
        let removed = MetadataMap::new();
        let deep = as_strings(&ffmpeg_args(
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            CleaningLevel::Deep,
            &removed,
        ));
        assert!(deep.windows(2).any(|w| w == ["-map_metadata", "-1"]));
        assert!(deep.windows(2).any(|w| w == ["-fflags", "+bitexact"]));
        assert!(!deep.iter().any(|a| a == "-map_chapters"));

        let paranoid = as_strings(&ffmpeg_args(
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            CleaningLevel::Paranoid,
            &removed,
        ));
        assert!(paranoid.windows(2).any(|w| w == ["-map_chapters", "-1"]));
    }

    #[test]
    fn missing_tools_fail_only_when_required() {
        let mut config = EngineConfig {
            ffmpeg_path: "/no/existe/ffmpeg".into(),
            ffprobe_path: "/no/existe/ffprobe".into(),
            ..EngineConfig::default()
        };
        assert!(matches!(FfmpegTool::locate(&config), Ok(None)));

        config.require_media_tools = true;
        let err = FfmpegTool::locate(&config).expect_err("debe exigir las herramientas");
        assert_eq!(err.kind(), crate::error::ErrorKind::ConfigError);
    }

    #[cfg(unix)]
    #[test]
    fn slow_process_is_killed() {
        let started = Instant::now();
        let err = run_with_timeout(
            Command::new("sleep").arg("10"),
            Duration::from_millis(100),
        )
        .expect_err("debe expirar");

        assert!(matches!(err, CleanError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn fast_process_output_is_collected() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let output = run_with_timeout(
            Command::new("echo").arg("hola"),
            Duration::from_secs(5),
        )?;
        assert!(output.status.success());
        assert_eq!(output.stdout, b"hola\n");
        Ok(())
    }
}

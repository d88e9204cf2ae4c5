use super::{
    blob_property, json_pretty, make_controller, resolve_artifact_id, ArtifactRef, Connection,
    EXIT_SUCCESS,
};
use crate::progress::ProgressReader;
use glare_client::GlareError;
use std::io::{self, IsTerminal, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

pub struct DownloadArgs<'a> {
    pub file: Option<&'a Path>,
    pub blob_property: Option<&'a str>,
    pub progress: bool,
}

fn copy_blob(source: &mut dyn Read, sink: &mut dyn Write) -> Result<u64, String> {
    io::copy(source, sink).map_err(|e| GlareError::from(e).to_string())
}

pub fn run(
    conn: &Connection,
    artifact: &ArtifactRef,
    args: &DownloadArgs<'_>,
    json: bool,
) -> Result<u8, String> {
    let property = blob_property(&artifact.type_name, args.blob_property)?;
    if args.file.is_none() && io::stdout().is_terminal() {
        return Err(
            "bad request: refusing to write blob data to a terminal, use --file or redirect stdout"
                .to_owned(),
        );
    }

    let ctl = make_controller(conn, Some(&artifact.type_name))?;
    let id = resolve_artifact_id(&ctl, artifact)?;
    let reader = ctl
        .download_blob(&id, &property, true, None)
        .map_err(|e| e.to_string())?;
    let size = reader.content_length();
    let mut source: Box<dyn Read> = if args.progress {
        Box::new(ProgressReader::new(reader, size, &format!("downloading {property}")))
    } else {
        Box::new(reader)
    };

    let Some(path) = args.file else {
        let mut out = io::stdout().lock();
        copy_blob(&mut source, &mut out)?;
        out.flush().map_err(|e| format!("failed to flush stdout: {e}"))?;
        return Ok(EXIT_SUCCESS);
    };

    // Stage next to the target so a failed checksum never leaves a partial file behind.
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut staged = NamedTempFile::new_in(dir)
        .map_err(|e| format!("failed to create temp file in {}: {e}", dir.display()))?;
    let written = copy_blob(&mut source, &mut staged)?;
    staged
        .persist(path)
        .map_err(|e| format!("failed to write {}: {}", path.display(), e.error))?;
    debug!("wrote {written} bytes to {}", path.display());

    if json {
        let payload = serde_json::json!({
            "id": id,
            "blob_property": property,
            "file": path.display().to_string(),
            "bytes": written,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("downloaded {property} of {id} to {}", path.display());
    }
    Ok(EXIT_SUCCESS)
}

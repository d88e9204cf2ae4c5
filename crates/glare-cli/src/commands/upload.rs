use super::{
    blob_property, make_controller, resolve_artifact_id, show_blob, spin_fail, spin_ok, spinner,
    ArtifactRef, Connection, EXIT_SUCCESS,
};
use crate::progress::ProgressReader;
use std::fs::File;
use std::io::{self, IsTerminal, Read};
use std::path::Path;

pub struct UploadArgs<'a> {
    pub file: Option<&'a Path>,
    pub blob_property: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub progress: bool,
}

pub fn run(
    conn: &Connection,
    artifact: &ArtifactRef,
    args: &UploadArgs<'_>,
    json: bool,
) -> Result<u8, String> {
    let property = blob_property(&artifact.type_name, args.blob_property)?;

    let (source, size): (Box<dyn Read>, Option<u64>) = match args.file {
        Some(path) => {
            let file = File::open(path)
                .map_err(|e| format!("failed to open {}: {e}", path.display()))?;
            let size = file.metadata().ok().map(|m| m.len());
            (Box::new(file), size)
        }
        None if io::stdin().is_terminal() => {
            return Err(
                "bad request: blob data is required, use --file or pipe it into stdin".to_owned(),
            )
        }
        None => (Box::new(io::stdin().lock()), None),
    };

    let ctl = make_controller(conn, Some(&artifact.type_name))?;
    let id = resolve_artifact_id(&ctl, artifact)?;

    let mut source: Box<dyn Read> = if args.progress {
        Box::new(ProgressReader::new(source, size, &format!("uploading {property}")))
    } else {
        source
    };
    let pb = (!args.progress && !json).then(|| spinner(&format!("uploading {property}…")));
    let result = ctl.upload_blob(&id, &property, &mut source, size, args.content_type, None);
    if let Err(e) = result {
        if let Some(ref pb) = pb {
            spin_fail(pb, "upload failed");
        }
        return Err(e.to_string());
    }
    if let Some(ref pb) = pb {
        spin_ok(pb, "upload complete");
    }

    show_blob(&ctl, &id, &property, json)?;
    Ok(EXIT_SUCCESS)
}

use super::{
    blob_property, make_controller, print_artifact, resolve_artifact_id, show_blob, ArtifactRef,
    Connection, EXIT_SUCCESS,
};
use glare_client::ExternalLocation;

pub struct LocationArgs<'a> {
    pub url: &'a str,
    pub md5: Option<&'a str>,
    pub sha1: Option<&'a str>,
    pub sha256: Option<&'a str>,
    pub blob_property: Option<&'a str>,
}

pub fn add(
    conn: &Connection,
    artifact: &ArtifactRef,
    args: &LocationArgs<'_>,
    json: bool,
) -> Result<u8, String> {
    let property = blob_property(&artifact.type_name, args.blob_property)?;
    let ctl = make_controller(conn, Some(&artifact.type_name))?;
    let id = resolve_artifact_id(&ctl, artifact)?;
    let location = ExternalLocation {
        md5: args.md5.map(str::to_owned),
        sha1: args.sha1.map(str::to_owned),
        sha256: args.sha256.map(str::to_owned),
        ..ExternalLocation::new(args.url)
    };
    ctl.add_external_location(&id, &property, &location, None)
        .map_err(|e| e.to_string())?;
    show_blob(&ctl, &id, &property, json)?;
    Ok(EXIT_SUCCESS)
}

pub fn remove(
    conn: &Connection,
    artifact: &ArtifactRef,
    blob_property_arg: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    let property = blob_property(&artifact.type_name, blob_property_arg)?;
    let ctl = make_controller(conn, Some(&artifact.type_name))?;
    let id = resolve_artifact_id(&ctl, artifact)?;
    ctl.remove_external_location(&id, &property, None)
        .map_err(|e| e.to_string())?;
    let updated = ctl.get(&id, None).map_err(|e| e.to_string())?;
    print_artifact(&updated, json)?;
    Ok(EXIT_SUCCESS)
}

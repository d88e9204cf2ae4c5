use super::{json_pretty, make_controller, Connection, EXIT_SUCCESS};
use serde_json::Value;

pub fn list(conn: &Connection, json: bool) -> Result<u8, String> {
    let ctl = make_controller(conn, None)?;
    let types = ctl.type_list().map_err(|e| e.to_string())?;
    if json {
        let payload: Vec<Value> = types
            .iter()
            .map(|(name, version)| serde_json::json!({ "name": name, "version": version }))
            .collect();
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("{:<24} VERSION", "NAME");
        for (name, version) in &types {
            println!("{name:<24} {version}");
        }
    }
    Ok(EXIT_SUCCESS)
}

pub fn show(conn: &Connection, type_name: &str, json: bool) -> Result<u8, String> {
    let ctl = make_controller(conn, Some(type_name))?;
    let schema = ctl.type_schema(None).map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&schema)?);
        return Ok(EXIT_SUCCESS);
    }

    let Some(props) = schema.get("properties").and_then(Value::as_object) else {
        println!("{}", json_pretty(&schema)?);
        return Ok(EXIT_SUCCESS);
    };
    println!("{:<24} {:<12} READ_ONLY", "NAME", "GLARE_TYPE");
    for (name, prop) in props {
        let glare_type = prop.get("glareType").and_then(Value::as_str).unwrap_or("");
        let read_only = prop
            .get("readOnly")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        println!("{name:<24} {glare_type:<12} {read_only}");
    }
    Ok(EXIT_SUCCESS)
}

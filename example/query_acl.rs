use std::fs;
use std::process;

use ad_security::descriptor::SecurityDescriptor;
use ad_security::directory::{trustee_name, MemoryDirectory};
use ad_security::mask::right_name;
use ad_security::policy::{protected_against_deletion, user_cant_change_pass};
use ad_security::schema::RightsSchema;
use clap::{App, Arg};
use tracing::error;
use tracing_subscriber::EnvFilter;

fn read_blob(path: &str, is_hex: bool) -> Result<Vec<u8>, String> {
    let raw = fs::read(path).map_err(|e| format!("Failed to read {}: {}", path, e))?;
    if !is_hex {
        return Ok(raw);
    }

    let text: String = String::from_utf8_lossy(&raw)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    hex::decode(text).map_err(|e| format!("{} is not valid hex: {}", path, e))
}

fn print_descriptor(sd: &SecurityDescriptor, schema: &RightsSchema) {
    // No directory to search here, only well-known trustees get names.
    let names = MemoryDirectory::new();

    match sd.owner() {
        Some(owner) => println!("Owner: {}", owner),
        None => println!("Owner: None"),
    }
    match sd.group() {
        Some(group) => println!("Group: {}", group),
        None => println!("Group: None"),
    }
    println!("Control: 0x{:04x}", sd.control());

    if !sd.has_dacl() {
        println!("No DACL present");
    }

    for (index, ace) in sd.dacl().iter().enumerate() {
        println!("  AccessControlEntry[{}] {{", index);
        for line in ace.to_string().lines() {
            println!("  {}", line);
        }
        println!("    Trustee={}", trustee_name(&names, &ace.trustee));
        println!(
            "    Right={}",
            right_name(schema, ace.access_mask, ace.object_type.as_ref())
        );
        println!("  }}");
    }

    println!("Protected against deletion: {}", protected_against_deletion(sd));
    println!("User cannot change password: {}", user_cant_change_pass(sd));
}

fn run() -> Result<(), String> {
    let matches = App::new("Query ACL")
        .about("Dumps a directory object's security descriptor")
        .arg(Arg::with_name("hex")
            .short("x")
            .long("hex")
            .help("Input file holds the descriptor as hex text")
            .takes_value(false))
        .arg(Arg::with_name("schema")
            .short("s")
            .long("schema")
            .help("TOML file with additional extended rights")
            .takes_value(true))
        .arg(Arg::with_name("path")
            .help("File holding an nTSecurityDescriptor value")
            .required(true)
            .index(1))
        .get_matches();

    let path = matches.value_of("path").unwrap_or_default();
    let schema = match matches.value_of("schema") {
        Some(schema_path) => RightsSchema::from_path(schema_path).map_err(|e| e.to_string())?,
        None => RightsSchema::default(),
    };

    let blob = read_blob(path, matches.is_present("hex"))?;
    let sd = SecurityDescriptor::from_bytes(&blob).map_err(|e| format!("Failed to decode {}: {}", path, e))?;

    println!("Security descriptor of {}", path);
    print_descriptor(&sd, &schema);
    Ok(())
}

pub fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(message) = run() {
        error!("{}", message);
        process::exit(1);
    }
}

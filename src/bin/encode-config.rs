//! Encodes a module config for distribution.
//!
//! Usage: `encode-config <short_id> <json>` — prints the encoded blob with
//! its trailing checksum. Argument handling stays on `std::env::args`
//! because the exit codes are part of the contract: 1 missing argument,
//! 2 unparseable JSON, 3 JSON that isn't an object.

use std::process::exit;

fn main() {
    let mut args = std::env::args().skip(1);

    let Some(short_id) = args.next().filter(|a| !a.is_empty()) else {
        eprintln!("ERROR: Argument 1 is required!");
        exit(1);
    };
    let Some(json) = args.next().filter(|a| !a.is_empty()) else {
        eprintln!("ERROR: Argument 2 is required!");
        exit(1);
    };

    let config: serde_json::Value = match serde_json::from_str(&json) {
        Ok(value) => value,
        Err(_) => {
            eprintln!("ERROR: Couldn't parse config. Argument 2 is expected to be JSON!");
            exit(2);
        }
    };

    let Some(map) = config.as_object() else {
        eprintln!("ERROR: Couldn't parse config. Argument 2 is expected to be a JSON object!");
        exit(3);
    };

    match licensegate::encode(map, &short_id) {
        Ok(encoded) => println!("{encoded}"),
        Err(err) => {
            eprintln!("ERROR: {err}");
            exit(2);
        }
    }
}

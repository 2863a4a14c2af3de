use std::fmt::Write;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    // Generated here rather than with a const fn, which hits the const eval limit
    let out_dir = std::env::var_os("OUT_DIR").expect("cargo always sets OUT_DIR for build scripts");
    let path = std::path::Path::new(&out_dir).join("hex.rs");
    let mut source = String::from("pub const HEX_PAIR_LOOKUP: [[u8; 256]; 256] = [\n");
    for high in 0..=u8::MAX {
        source.push_str("    [");
        for low in 0..=u8::MAX {
            let pair = hex_digit(high) << 4 | hex_digit(low);
            write!(source, "{pair},").expect("writing to a String can't fail");
        }
        source.push_str("],\n");
    }
    source.push_str("];\n");
    std::fs::write(&path, source).expect("couldn't write the hex lookup table");
}

/// Maps an ASCII hex digit to its value. Anything else maps to 0, the trace parser doesn't validate
fn hex_digit(input: u8) -> u8 {
    match input {
        b'0'..=b'9' => input - b'0',
        b'A'..=b'F' => input - b'A' + 10,
        b'a'..=b'f' => input - b'a' + 10,
        _ => 0,
    }
}

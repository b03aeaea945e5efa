use clap::CommandFactory;

#[path = "src/bin/bootlogger/args.rs"]
mod bootlogger;

fn main() -> std::io::Result<()> {
    println!("cargo:rerun-if-changed=src/bin/bootlogger/args.rs");

    // Generate man page
    // https://rust-cli.github.io/book/in-depth/docs.html
    let out_dir =
        std::path::PathBuf::from(std::env::var_os("OUT_DIR").ok_or(std::io::ErrorKind::NotFound)?);
    let cmd = bootlogger::Args::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buffer: Vec<u8> = Default::default();
    man.render(&mut buffer)?;

    std::fs::write(out_dir.join("bootlogger.1"), buffer)?;

    Ok(())
}

use anyhow::Result;

fn main() -> Result<()> {
    unitsplit_cli::main_entry()
}

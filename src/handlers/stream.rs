use anyhow::Result;
use idem::stream;

pub fn handle_glob(pattern: &str) -> Result<()> {
    print!("{}", stream::glob(pattern)?);
    Ok(())
}

pub fn handle_stream(values: &[String]) -> Result<()> {
    print!("{}", stream::stream(values)?);
    Ok(())
}

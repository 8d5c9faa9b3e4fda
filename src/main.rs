use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    studymate::cli::main()
}

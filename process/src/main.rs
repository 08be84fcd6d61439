use clap::Parser;
use dojo::month::Month;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    months_back: u32,

    #[arg(long)]
    from: Option<Month>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    process::run_sweep(args.months_back, args.from).await;
}

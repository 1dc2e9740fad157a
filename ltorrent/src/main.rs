use clap::Parser;
use ltorrent::{
    config::cfg::Cfg, logger::logger_sender::LoggerSender,
    torrent_handler::handler::TorrentHandler, torrent_parser::parser::TorrentParser,
};
use tracing::error;

#[derive(Parser, Debug)]
struct Args {
    /// Path to the .torrent file
    torrent: String,
    /// Directory the downloaded files are written to
    #[arg(default_value = ".")]
    output_dir: String,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    let torrent = match TorrentParser::parse(&args.torrent) {
        Ok(torrent) => torrent,
        Err(err) => {
            error!("could not load torrent file {}: {:?}", args.torrent, err);
            std::process::exit(1);
        }
    };

    let cfg = Cfg::new(args.output_dir);
    let logger_sender = LoggerSender::new(&format!("Torrent: {}", torrent.name()));
    let mut handler = TorrentHandler::new(torrent, cfg, logger_sender.clone());
    if let Err(err) = handler.handle() {
        logger_sender.error(&format!("download failed: {:?}", err));
        std::process::exit(1);
    }
}

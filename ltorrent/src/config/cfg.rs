use rand::{distributions::Alphanumeric, Rng};

use super::constants::CLIENT_PORT_RANGE;

/// `Cfg` struct carrying the per-run parameters of the client.
///
/// - `output_directory`: directory the downloaded files are written to,
/// - `tcp_port`: port advertised to the tracker,
/// - `peer_id`: 20-byte identity of this client, regenerated per run.
#[derive(Debug, Clone)]
pub struct Cfg {
    pub output_directory: String,
    pub tcp_port: u16,
    pub peer_id: [u8; 20],
}

impl Cfg {
    /// Builds a `Cfg` for one run: the output directory comes from the
    /// command line, the port and peer id are drawn fresh.
    pub fn new(output_directory: String) -> Self {
        let mut rng = rand::thread_rng();

        let mut peer_id = [0u8; 20];
        for b in peer_id.iter_mut() {
            *b = rng.sample(Alphanumeric);
        }

        let (low, high) = CLIENT_PORT_RANGE;
        Self {
            output_directory,
            tcp_port: rng.gen_range(low..=high),
            peer_id,
        }
    }
}

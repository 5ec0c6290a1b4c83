//! Blocking client for an Esplora-style block explorer REST API.
//!
//! Endpoints used:
//! - `GET  /address/{addr}/utxo` for the wallet's unspent outputs
//! - `GET  /tx/{txid}` for decoded transaction detail
//! - `POST /tx` with a hex body to relay a signed transaction

use std::time::Duration;

use bitcoin::Txid;
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::debug;

use crate::error::BtcError;
use crate::transaction::TxBroadcaster;
use crate::utxo::{Utxo, UtxoSource};

/// Confirmation status attached to explorer UTXOs and transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TxStatus {
    pub confirmed: bool,
    #[serde(default)]
    pub block_height: Option<u32>,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub block_time: Option<u64>,
}

/// One entry of `GET /address/{addr}/utxo`.
#[derive(Debug, Clone, Deserialize)]
pub struct EsploraUtxo {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    pub status: TxStatus,
}

impl From<EsploraUtxo> for Utxo {
    fn from(u: EsploraUtxo) -> Self {
        Utxo {
            txid: u.txid,
            vout: u.vout,
            amount_sat: u.value,
            confirmed: u.status.confirmed,
        }
    }
}

/// An output as reported by `GET /tx/{txid}`.
#[derive(Debug, Clone, Deserialize)]
pub struct EsploraVout {
    pub scriptpubkey: String,
    #[serde(default)]
    pub scriptpubkey_type: Option<String>,
    /// Absent for outputs with no standard address (e.g. OP_RETURN).
    #[serde(default)]
    pub scriptpubkey_address: Option<String>,
    pub value: u64,
}

/// An input as reported by `GET /tx/{txid}`.
#[derive(Debug, Clone, Deserialize)]
pub struct EsploraVin {
    pub txid: String,
    pub vout: u32,
    #[serde(default)]
    pub prevout: Option<EsploraVout>,
    #[serde(default)]
    pub witness: Vec<String>,
    #[serde(default)]
    pub is_coinbase: bool,
    pub sequence: u32,
}

/// Decoded transaction detail from `GET /tx/{txid}`.
#[derive(Debug, Clone, Deserialize)]
pub struct EsploraTx {
    pub txid: String,
    pub version: i32,
    pub locktime: u32,
    pub vin: Vec<EsploraVin>,
    pub vout: Vec<EsploraVout>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub fee: u64,
    pub status: TxStatus,
}

impl EsploraTx {
    /// Outputs paying `address`, with their indices.
    pub fn outputs_to<'a>(&'a self, address: &'a str) -> impl Iterator<Item = (u32, &'a EsploraVout)> {
        self.vout
            .iter()
            .enumerate()
            .filter(move |(_, out)| out.scriptpubkey_address.as_deref() == Some(address))
            .map(|(index, out)| (index as u32, out))
    }
}

/// Parse a `GET /address/{addr}/utxo` body, preserving the explorer's order.
pub fn parse_utxos(body: &str) -> Result<Vec<Utxo>, BtcError> {
    let entries: Vec<EsploraUtxo> = serde_json::from_str(body)
        .map_err(|e| BtcError::Explorer(format!("malformed utxo list: {e}")))?;
    Ok(entries.into_iter().map(Utxo::from).collect())
}

/// Parse a `GET /tx/{txid}` body.
pub fn parse_transaction(body: &str) -> Result<EsploraTx, BtcError> {
    serde_json::from_str(body)
        .map_err(|e| BtcError::Explorer(format!("malformed transaction: {e}")))
}

/// Parse the body of a successful `POST /tx`, which is the bare txid.
pub fn parse_broadcast_response(body: &str) -> Result<Txid, BtcError> {
    body.trim()
        .parse()
        .map_err(|e| BtcError::Broadcast(format!("response is not a txid ({}): {e}", body.trim())))
}

/// Esplora REST client. Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct EsploraClient {
    client: Client,
    base_url: String,
}

impl EsploraClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BtcError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BtcError::Explorer(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// `GET /address/{address}/utxo`
    pub fn fetch_utxos(&self, address: &str) -> Result<Vec<Utxo>, BtcError> {
        let body = self.get_text(&format!("address/{address}/utxo"))?;
        parse_utxos(&body)
    }

    /// `GET /tx/{txid}`
    pub fn fetch_transaction(&self, txid: &str) -> Result<EsploraTx, BtcError> {
        let body = self.get_text(&format!("tx/{txid}"))?;
        parse_transaction(&body)
    }

    /// `POST /tx` with the raw transaction hex as a `text/plain` body.
    pub fn post_transaction(&self, raw_tx_hex: &str) -> Result<Txid, BtcError> {
        let url = self.url("tx");
        debug!(%url, bytes = raw_tx_hex.len() / 2, "POST");
        let resp = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "text/plain")
            .body(raw_tx_hex.to_owned())
            .send()
            .map_err(|e| BtcError::Broadcast(format!("POST {url}: {e}")))?;

        let body = read_success(resp).map_err(|e| match e {
            BtcError::Explorer(msg) => BtcError::Broadcast(msg),
            other => other,
        })?;
        parse_broadcast_response(&body)
    }

    fn get_text(&self, path: &str) -> Result<String, BtcError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| BtcError::Explorer(format!("GET {url}: {e}")))?;
        read_success(resp)
    }
}

/// Return the body of a 2xx response; anything else becomes an error that
/// carries the status line and the explorer's message.
fn read_success(resp: Response) -> Result<String, BtcError> {
    let status = resp.status();
    let url = resp.url().to_string();
    let body = resp
        .text()
        .map_err(|e| BtcError::Explorer(format!("{url}: failed to read body: {e}")))?;
    debug!(%url, status = status.as_u16(), "response");

    if !status.is_success() {
        return Err(BtcError::Explorer(format!("{url}: {status}: {}", body.trim())));
    }
    Ok(body)
}

impl UtxoSource for EsploraClient {
    fn unspent_outputs(&self, address: &str) -> Result<Vec<Utxo>, BtcError> {
        self.fetch_utxos(address)
    }
}

impl TxBroadcaster for EsploraClient {
    fn broadcast_hex(&self, raw_tx_hex: &str) -> Result<Txid, BtcError> {
        self.post_transaction(raw_tx_hex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UTXO_BODY: &str = r#"[
        {"txid":"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa","vout":1,
         "status":{"confirmed":true,"block_height":2500000,
                   "block_hash":"000000000000001b","block_time":1700000000},
         "value":50000},
        {"txid":"bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb","vout":0,
         "status":{"confirmed":false},"value":30000}
    ]"#;

    const TX_BODY: &str = r#"{
        "txid":"cccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccc",
        "version":2,"locktime":0,
        "vin":[{"txid":"dddddddddddddddddddddddddddddddddddddddddddddddddddddddddddddddd",
                "vout":0,"prevout":null,"witness":["30440220","02aa"],
                "is_coinbase":false,"sequence":4294967295}],
        "vout":[{"scriptpubkey":"0014751e76e8199196d454941c45d1b3a323f1433bd6",
                 "scriptpubkey_type":"v0_p2wpkh",
                 "scriptpubkey_address":"tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx",
                 "value":40000},
                {"scriptpubkey":"6a00","scriptpubkey_type":"op_return","value":0},
                {"scriptpubkey":"0014751e76e8199196d454941c45d1b3a323f1433bd6",
                 "scriptpubkey_address":"tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx",
                 "value":9720}],
        "size":222,"weight":561,"fee":280,
        "status":{"confirmed":false}
    }"#;

    #[test]
    fn parse_utxos_preserves_order_and_flags() {
        let utxos = parse_utxos(UTXO_BODY).unwrap();
        assert_eq!(utxos.len(), 2);
        assert_eq!(utxos[0].txid, "a".repeat(64));
        assert_eq!(utxos[0].vout, 1);
        assert_eq!(utxos[0].amount_sat, 50_000);
        assert!(utxos[0].confirmed);
        assert!(!utxos[1].confirmed);
    }

    #[test]
    fn parse_utxos_empty_list() {
        assert!(parse_utxos("[]").unwrap().is_empty());
    }

    #[test]
    fn parse_utxos_rejects_garbage() {
        assert!(matches!(parse_utxos("<html>"), Err(BtcError::Explorer(_))));
    }

    #[test]
    fn parse_transaction_detail() {
        let tx = parse_transaction(TX_BODY).unwrap();
        assert_eq!(tx.version, 2);
        assert_eq!(tx.fee, 280);
        assert_eq!(tx.vin.len(), 1);
        assert!(tx.vin[0].prevout.is_none());
        assert_eq!(tx.vout.len(), 3);
        assert!(tx.vout[1].scriptpubkey_address.is_none());
        assert!(!tx.status.confirmed);
    }

    #[test]
    fn outputs_to_filters_by_address() {
        let tx = parse_transaction(TX_BODY).unwrap();
        let mine: Vec<(u32, u64)> = tx
            .outputs_to("tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx")
            .map(|(i, out)| (i, out.value))
            .collect();
        assert_eq!(mine, vec![(0, 40_000), (2, 9_720)]);
        assert_eq!(tx.outputs_to("tb1qother").count(), 0);
    }

    #[test]
    fn parse_broadcast_response_accepts_txid() {
        let body = format!("{}\n", "c".repeat(64));
        let txid = parse_broadcast_response(&body).unwrap();
        assert_eq!(txid.to_string(), "c".repeat(64));
    }

    #[test]
    fn parse_broadcast_response_rejects_error_text() {
        let result = parse_broadcast_response("sendrawtransaction RPC error: bad-txns");
        assert!(matches!(result, Err(BtcError::Broadcast(_))));
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client =
            EsploraClient::new("https://blockstream.info/testnet/api/", Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.base_url(), "https://blockstream.info/testnet/api");
        assert_eq!(
            client.url("address/tb1q/utxo"),
            "https://blockstream.info/testnet/api/address/tb1q/utxo"
        );
    }
}

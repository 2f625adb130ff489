use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use tracing::{debug, info};

use crate::config::{Config, Credentials};
use crate::error::ProviderError;
use crate::provider::{AddressUtxo, ChainProvider, TxInfo};

const USER_AGENT: &str = concat!("btc-provider/", env!("CARGO_PKG_VERSION"));

/// Blocking client for an Esplora REST backend (blockstream.info,
/// mempool.space, or a self-hosted instance).
#[derive(Debug, Clone)]
pub struct EsploraClient {
    http: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl EsploraClient {
    pub fn new(config: &Config) -> Result<Self, ProviderError> {
        config.validate()?;
        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProviderError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            credentials: config.credentials.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(creds) => request.basic_auth(&creds.user, Some(&creds.password)),
            None => request,
        }
    }

    fn get(&self, path: &str) -> Result<Response, ProviderError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self.authorize(self.http.get(&url)).send()?;
        ensure_success(response)
    }
}

/// Pass 2xx responses through; anything else becomes `Http` with the body verbatim.
fn ensure_success(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(http_error(status, response))
}

fn http_error(status: StatusCode, response: Response) -> ProviderError {
    ProviderError::Http {
        status: status.as_u16(),
        body: response
            .text()
            .unwrap_or_else(|e| format!("<unreadable body: {e}>")),
    }
}

/// A block hash is 32 bytes rendered as 64 hex characters.
fn parse_block_hash(body: &str) -> Result<String, ProviderError> {
    let hash = body.trim();
    if hash.len() != 64 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ProviderError::InvalidResponse(format!(
            "block hash {hash:?} is not 64 hex characters"
        )));
    }
    Ok(hash.to_ascii_lowercase())
}

impl ChainProvider for EsploraClient {
    fn fetch_utxos(&self, address: &str) -> Result<Vec<AddressUtxo>, ProviderError> {
        let utxos: Vec<AddressUtxo> = self.get(&format!("/address/{address}/utxo"))?.json()?;
        debug!(address, count = utxos.len(), "fetched UTXOs");
        Ok(utxos)
    }

    fn fetch_output_script(&self, txid: &str, vout: u32) -> Result<String, ProviderError> {
        let tx: TxInfo = self.get(&format!("/tx/{txid}"))?.json()?;
        let output_count = tx.vout.len();
        tx.vout
            .into_iter()
            .nth(vout as usize)
            .map(|out| out.scriptpubkey)
            .ok_or_else(|| {
                ProviderError::InvalidResponse(format!(
                    "transaction {txid} has {output_count} outputs, no output {vout}"
                ))
            })
    }

    fn broadcast(&self, raw_tx_hex: &str) -> Result<String, ProviderError> {
        let url = self.url("/tx");
        debug!(%url, bytes = raw_tx_hex.len() / 2, "POST");
        let response = self
            .authorize(self.http.post(&url))
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(raw_tx_hex.to_string())
            .send()?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(http_error(status, response));
        }

        let txid = response.text()?.trim().to_string();
        info!(%txid, provider = self.name(), "broadcast accepted");
        Ok(txid)
    }

    fn tip_height(&self) -> Result<u64, ProviderError> {
        let body = self.get("/blocks/tip/height")?.text()?;
        body.trim().parse().map_err(|e| {
            ProviderError::InvalidResponse(format!("tip height {body:?} is not a number: {e}"))
        })
    }

    fn block_hash(&self, height: u64) -> Result<String, ProviderError> {
        let body = self.get(&format!("/block-height/{height}"))?.text()?;
        let hash = parse_block_hash(&body)?;
        debug!(height, %hash, "resolved block");
        Ok(hash)
    }

    fn name(&self) -> &str {
        "esplora"
    }
}

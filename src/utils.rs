use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use std::future::Future;

use crate::error::Outcome;

/// Runs `fetch` for every key with at most `concurrency` requests in flight.
/// Results come back in key order regardless of completion order.
pub fn fetch_stream<K, T, F, Fut>(
    keys: impl IntoIterator<Item = K>,
    concurrency: usize,
    fetch: F,
) -> impl Stream<Item = Outcome<T>>
where
    F: FnMut(K) -> Fut,
    Fut: Future<Output = Outcome<T>>,
{
    stream::iter(keys).map(fetch).buffered(concurrency.max(1))
}

/// Same as [`fetch_stream`], stops at the first failure.
pub async fn fetch_ordered<K, T, F, Fut>(
    keys: impl IntoIterator<Item = K>,
    concurrency: usize,
    fetch: F,
) -> Outcome<Vec<T>>
where
    F: FnMut(K) -> Fut,
    Fut: Future<Output = Outcome<T>>,
{
    fetch_stream(keys, concurrency, fetch).try_collect().await
}

/// Read-through caching for catalog calls.
///
/// Returns the cached value for `$key` when present. Otherwise awaits `$block`,
/// queues the result for a background cache write with `$ttl` seconds, and
/// returns it. A failed cache read counts as a miss; errors from `$block` propagate
/// with `?`.
///
/// # Example
/// ```rust,ignore
/// cached!(self.cache, CacheKey::GenreList, GENRE_CACHE_TTL, async move {
///     self.fetch_genres().await
/// })
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        if let Some(cached) = $cache.get_from_cache(&key).await {
            tracing::debug!(key = %key, "Cache hit");
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.set_in_background(&key, &value, $ttl);
            Ok(value)
        }
    }};
}

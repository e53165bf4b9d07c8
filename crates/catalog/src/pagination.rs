use crate::error::Result;
use crate::models::{Asset, Pagination};
use crate::repo::AssetRepository;
use async_stream::stream;
use futures::Stream;

/// Streams every asset in `repo`, one page of up to `take` assets at a time.
///
/// Pages are fetched lazily as the stream is polled, so only one page is ever
/// held in memory. See [`paginate_from`].
pub fn paginate(repo: &dyn AssetRepository, take: usize) -> impl Stream<Item = Result<Vec<Asset>>> + '_ {
    paginate_from(repo, Pagination::first(take))
}

/// Streams pages of assets starting at an arbitrary window, which lets a
/// caller resume a listing from a previously reached offset.
///
/// The stream ends after a page reporting no successor, after an empty page
/// (whatever the store claims), or after yielding the first error.
pub fn paginate_from(repo: &dyn AssetRepository, start: Pagination) -> impl Stream<Item = Result<Vec<Asset>>> + '_ {
    stream!({
        let mut window = start;
        loop {
            let page = match repo.get_all(window).await {
                Ok(page) => page,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            let received = page.items.len();
            if received == 0 {
                return;
            }
            tracing::trace!(skip = window.skip, received, "Fetched asset page");
            yield Ok(page.items);
            if !page.has_next_page {
                return;
            }
            window = window.advance(received);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryCatalog;
    use crate::models::AssetId;
    use futures::TryStreamExt;
    use rstest::rstest;
    use time::macros::datetime;

    fn catalog(count: usize) -> MemoryCatalog {
        let created = datetime!(2023-02-23 12:00 UTC);
        MemoryCatalog::default()
            .with_assets((0..count).map(|i| Asset::new(format!("asset-{i}").as_str(), "user-id", format!("{i}.jpg"), created)))
    }

    #[tokio::test]
    async fn test_yields_every_page() {
        let catalog = catalog(5);
        let pages: Vec<Vec<Asset>> = paginate(&catalog, 2).try_collect().await.unwrap();
        assert_eq!(pages.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 2, 1]);
        assert_eq!(catalog.get_all_calls().await, vec![
            Pagination { skip: 0, take: 2 },
            Pagination { skip: 2, take: 2 },
            Pagination { skip: 4, take: 2 },
        ]);
    }

    #[rstest]
    #[case(4, 2, vec![2, 2])]
    #[case(3, 10, vec![3])]
    #[case(7, 3, vec![3, 3, 1])]
    #[case(2, 1, vec![1, 1])]
    #[tokio::test]
    async fn test_page_sizes(#[case] count: usize, #[case] take: usize, #[case] expected: Vec<usize>) {
        let catalog = catalog(count);
        let pages: Vec<Vec<Asset>> = paginate(&catalog, take).try_collect().await.unwrap();
        assert_eq!(pages.iter().map(Vec::len).collect::<Vec<_>>(), expected);
    }

    #[tokio::test]
    async fn test_empty_catalog_makes_one_call() {
        let catalog = MemoryCatalog::default();
        let pages: Vec<Vec<Asset>> = paginate(&catalog, 10).try_collect().await.unwrap();
        assert!(pages.is_empty());
        assert_eq!(catalog.get_all_calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_resumes_from_offset() {
        let catalog = catalog(4);
        let pages: Vec<Vec<Asset>> =
            paginate_from(&catalog, Pagination { skip: 3, take: 2 }).try_collect().await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0][0].id, AssetId::new("asset-3"));
    }
}

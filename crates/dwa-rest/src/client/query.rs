//! Collection queries: paging, counts, and FetchXML.

use tracing::{debug, instrument};

use dynamics_web_api_client::{
    Collection, Error, ErrorKind, ParseOptions, QueryOptions, Request, RequestMethod,
    ResponseBody, Result, Transport,
};

use super::WebApiClient;

impl<T: Transport> WebApiClient<T> {
    /// Retrieve one page of a collection.
    #[instrument(skip(self, request), fields(collection = ?request.collection))]
    pub async fn retrieve_multiple(&self, request: Request) -> Result<Collection> {
        let body = self
            .execute(
                RequestMethod::Get,
                &request,
                "retrieveMultiple",
                ParseOptions::default(),
            )
            .await?;
        into_collection(body, "retrieveMultiple")
    }

    /// Retrieve the page behind an `@odata.nextLink`.
    ///
    /// Header options of `request` (token, page size, annotations) carry
    /// over; its addressing and query options are replaced by the link.
    #[instrument(skip(self, request, next_link))]
    pub async fn retrieve_next_page(&self, request: &Request, next_link: &str) -> Result<Collection> {
        let next = Request {
            url: Some(next_link.to_string()),
            collection: None,
            key: None,
            id: None,
            query: QueryOptions::default(),
            fetch_xml: None,
            additional_url: None,
            ..request.clone()
        };
        self.retrieve_multiple(next).await
    }

    /// Retrieve every page of a collection, following `@odata.nextLink`.
    ///
    /// The returned collection holds all records; `count` and `context`
    /// come from the first page and `delta_link` from the last.
    #[instrument(skip(self, request), fields(collection = ?request.collection))]
    pub async fn retrieve_all(&self, request: Request) -> Result<Collection> {
        let mut all = self.retrieve_multiple(request.clone()).await?;
        let mut next_link = all.next_link.take();
        let mut pages = 1usize;

        while let Some(link) = next_link {
            let mut page = self.retrieve_next_page(&request, &link).await?;
            pages += 1;
            debug!(pages, records = page.value.len(), "Fetched next page");

            all.value.append(&mut page.value);
            if page.delta_link.is_some() {
                all.delta_link = page.delta_link;
            }
            next_link = page.next_link;
        }

        Ok(all)
    }

    /// Count records.
    ///
    /// Without a filter this reads the collection's `/$count` (capped at
    /// 5000 by the server); with a filter it requests `$count=true` and
    /// reads `@odata.count`.
    #[instrument(skip(self, request), fields(collection = ?request.collection))]
    pub async fn count(&self, mut request: Request) -> Result<u64> {
        let options = if request.query.filter.is_none() {
            request.additional_url = Some("$count".to_string());
            ParseOptions::default()
        } else {
            request.query.count = true;
            ParseOptions {
                to_count: true,
                ..Default::default()
            }
        };

        let body = self
            .execute(RequestMethod::Get, &request, "count", options)
            .await?;

        body.count().ok_or_else(|| {
            Error::new(ErrorKind::Parse {
                message: "count: response carried no record count".to_string(),
                raw: format!("{body:?}"),
            })
        })
    }

    /// Run a FetchXML query against the request's collection.
    #[instrument(skip(self, request), fields(collection = ?request.collection))]
    pub async fn fetch(&self, request: Request) -> Result<Collection> {
        if request.fetch_xml.is_none() {
            return Err(Error::missing("fetch", "request.fetch_xml"));
        }
        let body = self
            .execute(RequestMethod::Get, &request, "fetch", ParseOptions::default())
            .await?;
        into_collection(body, "fetch")
    }
}

fn into_collection(body: ResponseBody, operation: &str) -> Result<Collection> {
    match body {
        ResponseBody::Collection(collection) => Ok(collection),
        ResponseBody::Empty => Ok(Collection::default()),
        other => Err(Error::new(ErrorKind::Parse {
            message: format!("{operation}: expected a collection response"),
            raw: format!("{other:?}"),
        })),
    }
}

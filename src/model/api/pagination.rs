use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};
use serde::Serialize;

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 500;

/// Pagination query parameters, with sane defaults and bounds.
pub struct Pagination {
    page_num: usize,
    page_size: usize,
}

impl Pagination {
    pub fn page_num(&self) -> usize {
        self.page_num
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn skip(&self) -> u64 {
        ((self.page_num - 1) * self.page_size) as u64
    }

    /// Wrap one page of items together with the total count.
    pub fn paginate<T>(self, items: Vec<T>, total: u64) -> Paginated<T> {
        Paginated {
            items,
            page_num: self.page_num,
            page_size: self.page_size,
            total,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Pagination {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let page_num = if let Ok(page_num) = req.query_value::<usize>("page_num").unwrap_or(Ok(1)) {
            page_num
        } else {
            return request::Outcome::Error((Status::BadRequest, ()));
        };
        let page_size = if let Ok(page_size) = req
            .query_value::<usize>("page_size")
            .unwrap_or(Ok(DEFAULT_PAGE_SIZE))
        {
            page_size
        } else {
            return request::Outcome::Error((Status::BadRequest, ()));
        };
        request::Outcome::Success(Self {
            page_num: page_num.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        })
    }
}

/// One page of results.
#[derive(Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page_num: usize,
    pub page_size: usize,
    pub total: u64,
}

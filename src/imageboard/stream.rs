use std::fmt;
use std::io::Read;
use std::marker::PhantomData;

use serde::de::{self, DeserializeOwned, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserializer;

use crate::Error;

/// One step from the document root towards the items of interest.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Step {
    /// Descend into the value under this key of an object.
    Key(&'static str),
    /// Visit every element of an array.
    Each,
}

pub(crate) const THREAD_POSTS: &[Step] = &[Step::Key("posts"), Step::Each];
pub(crate) const CATALOG_THREADS: &[Step] = &[Step::Each, Step::Key("threads"), Step::Each];

/// Streams `body`, decoding each item found at the end of `path` as `T` and
/// handing it to `f` before the next one is read. An error returned by `f`
/// stops the walk and is returned as is.
pub(crate) fn walk<R, T, F>(body: R, path: &[Step], mut f: F) -> Result<(), Error>
where
    R: Read,
    T: DeserializeOwned,
    F: FnMut(T) -> Result<(), Error>,
{
    let mut failure = None;
    let mut de = serde_json::Deserializer::from_reader(body);
    let res = Walk {
        path,
        f: &mut f,
        failure: &mut failure,
        _item: PhantomData,
    }
    .deserialize(&mut de)
    .and_then(|_| de.end());

    match (failure, res) {
        (Some(err), _) => Err(err),
        (None, Err(err)) => Err(err.into()),
        (None, Ok(())) => Ok(()),
    }
}

struct Walk<'a, 'p, T, F> {
    path: &'p [Step],
    f: &'a mut F,
    failure: &'a mut Option<Error>,
    _item: PhantomData<fn() -> T>,
}

impl<'a, 'p, T, F> Walk<'a, 'p, T, F> {
    fn child<'b>(&'b mut self) -> Walk<'b, 'p, T, F> {
        Walk {
            path: &self.path[1..],
            f: &mut *self.f,
            failure: &mut *self.failure,
            _item: PhantomData,
        }
    }
}

impl<'de, 'a, 'p, T, F> DeserializeSeed<'de> for Walk<'a, 'p, T, F>
where
    T: DeserializeOwned,
    F: FnMut(T) -> Result<(), Error>,
{
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        match self.path.first() {
            None => {
                let item = T::deserialize(deserializer)?;
                (self.f)(item).map_err(|err| {
                    let msg = err.to_string();
                    *self.failure = Some(err);
                    de::Error::custom(msg)
                })
            }
            Some(Step::Key(_)) => deserializer.deserialize_map(self),
            Some(Step::Each) => deserializer.deserialize_seq(self),
        }
    }
}

impl<'de, 'a, 'p, T, F> Visitor<'de> for Walk<'a, 'p, T, F>
where
    T: DeserializeOwned,
    F: FnMut(T) -> Result<(), Error>,
{
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.path.first() {
            Some(Step::Key(key)) => write!(f, "an object with a '{}' key", key),
            _ => f.write_str("an array"),
        }
    }

    fn visit_map<A: MapAccess<'de>>(mut self, mut map: A) -> Result<(), A::Error> {
        let wanted = match self.path.first() {
            Some(Step::Key(key)) => *key,
            _ => return Err(de::Error::custom("unexpected object")),
        };
        while let Some(key) = map.next_key::<String>()? {
            if key == wanted {
                map.next_value_seed(self.child())?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(())
    }

    fn visit_seq<A: SeqAccess<'de>>(mut self, mut seq: A) -> Result<(), A::Error> {
        while seq.next_element_seed(self.child())?.is_some() {}
        Ok(())
    }
}

//! The four components that encode one hierarchy edge set.
//!
//! Every type is generic over a tag `T`; distinct tags give fully disjoint
//! storage. `PhantomData<fn() -> T>` keeps the components `Send + Sync` and
//! free of trait bounds on the tag, so an uninhabited `enum MyTag {}` works.
//!
//! Standard traits are implemented by hand because `derive` would require
//! them of `T` as well.

use std::fmt;
use std::marker::PhantomData;

use crate::entity::Entity;

macro_rules! tagged_component {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$fmeta:meta])* $field:ident : $ty:ty = $default:expr),+ $(,)? }
    ) => {
        $(#[$meta])*
        pub struct $name<T> {
            $($(#[$fmeta])* pub $field: $ty,)+
            _tag: PhantomData<fn() -> T>,
        }

        impl<T> $name<T> {
            #[inline]
            pub fn new($($field: $ty),+) -> Self {
                Self { $($field,)+ _tag: PhantomData }
            }
        }

        impl<T> Default for $name<T> {
            fn default() -> Self {
                Self::new($($default),+)
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> PartialEq for $name<T> {
            fn eq(&self, other: &Self) -> bool {
                true $(&& self.$field == other.$field)+
            }
        }

        impl<T> Eq for $name<T> {}

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    $(.field(stringify!($field), &self.$field))+
                    .finish()
            }
        }
    };
}

tagged_component! {
    /// Present iff the entity is currently a child under hierarchy `T`.
    ParentLink {
        parent: Entity = Entity::NULL,
    }
}

tagged_component! {
    /// Neighbours among the children of the same parent.
    ///
    /// Present iff [`ParentLink`] is. [`Entity::NULL`] marks a list end.
    SiblingLinks {
        next: Entity = Entity::NULL,
        prev: Entity = Entity::NULL,
    }
}

tagged_component! {
    /// Head of the entity's children list. Present iff it has children.
    FirstChild {
        first: Entity = Entity::NULL,
    }
}

tagged_component! {
    /// Number of direct children. Present iff [`FirstChild`] is, and then
    /// always at least one.
    ChildCount {
        size: usize = 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    enum Tag {}

    fn assert_send_sync<X: Send + Sync + 'static>() {}

    #[test]
    fn uninhabited_tag_is_fine() {
        assert_send_sync::<ParentLink<Tag>>();
        assert_send_sync::<SiblingLinks<Tag>>();
        assert_send_sync::<FirstChild<Tag>>();
        assert_send_sync::<ChildCount<Tag>>();
        assert_eq!(std::mem::size_of::<ParentLink<Tag>>(), 8);
    }

    #[test]
    fn defaults_are_unlinked() {
        let links = SiblingLinks::<Tag>::default();
        assert!(links.next.is_null() && links.prev.is_null());
        assert_eq!(ChildCount::<Tag>::default().size, 0);
        assert_eq!(
            format!("{:?}", FirstChild::<Tag>::new(Entity::new(1, 0))),
            "FirstChild { first: Entity(1v0) }"
        );
    }
}

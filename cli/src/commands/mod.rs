mod collection;
mod helpers;
mod item;
mod photo;
mod settings;
mod tag;
mod transfer;

pub(crate) use collection::{
    cmd_collection_create, cmd_collection_delete, cmd_collection_list, cmd_collection_rename,
    cmd_collection_show,
};
pub(crate) use item::{AddArgs, ListArgs, UpdateArgs, cmd_add, cmd_delete, cmd_list, cmd_show, cmd_update};
pub(crate) use photo::{cmd_photo_add, cmd_photo_delete, cmd_photo_get};
pub(crate) use settings::{cmd_config_set, cmd_config_show};
pub(crate) use tag::{cmd_tag_add, cmd_tag_list, cmd_tag_remove};
pub(crate) use transfer::{cmd_export_all, cmd_export_blog, cmd_export_collection, cmd_import};

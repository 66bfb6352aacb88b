use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "movie")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub tmdb_id: i64,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub overview: String,
    pub poster_url: String,
    pub backdrop_url: String,
    pub release_date: String,
    pub vote_average: f64,
    pub adult: bool,
    #[sea_orm(column_type = "Text")]
    pub actors: String,
    #[sea_orm(column_type = "Text")]
    pub directors: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
